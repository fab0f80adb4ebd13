//! Fader value conversions
//!
//! The console transmits levels as a 7-bit byte spread linearly over
//! -58.5 dB .. +10 dB (0 meaning -inf). Physical fader travel follows the
//! console's audio taper: four linear segments joined at positions
//! 0.0625, 0.25 and 0.5 (-60, -30 and -10 dB).
//!
//! Fades interpolate either in fader position (dB-aware, sounds like a hand
//! on the fader) or directly on the byte.

/// Level of wire byte 1, the quietest audible value
pub const MIN_DB: f64 = -58.5;
/// Level of wire byte 127
pub const MAX_DB: f64 = 10.0;
/// Highest wire value
pub const MAX_BYTE: u8 = 0x7F;

const DB_RANGE: f64 = MAX_DB - MIN_DB;

/// Convert a wire byte to dB; 0 is -inf
pub fn fader_byte_to_db(byte: u8) -> f64 {
    let byte = byte.min(MAX_BYTE);
    if byte == 0 {
        return f64::NEG_INFINITY;
    }
    MIN_DB + f64::from(byte) / f64::from(MAX_BYTE) * DB_RANGE
}

/// Convert dB to the nearest wire byte, clamped to 0..=127
///
/// -inf, NaN and anything at or below the floor map to 0.
pub fn db_to_fader_byte(db: f64) -> u8 {
    if db.is_nan() || db <= MIN_DB {
        return 0;
    }
    let scaled = ((db - MIN_DB) / DB_RANGE * f64::from(MAX_BYTE)).round();
    scaled.clamp(0.0, f64::from(MAX_BYTE)) as u8
}

/// Fader position in [0, 1] for a dB value
pub fn db_to_position(db: f64) -> f64 {
    if db.is_nan() {
        return 0.0;
    }
    let position = if db < -60.0 {
        (db + 90.0) / 480.0
    } else if db < -30.0 {
        (db + 70.0) / 160.0
    } else if db < -10.0 {
        (db + 50.0) / 80.0
    } else {
        (db + 30.0) / 40.0
    };
    position.clamp(0.0, 1.0)
}

/// dB value at a fader position; positions outside [0, 1] are clamped
pub fn position_to_db(position: f64) -> f64 {
    let p = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
    if p >= 0.5 {
        p * 40.0 - 30.0
    } else if p >= 0.25 {
        p * 80.0 - 50.0
    } else if p >= 0.0625 {
        p * 160.0 - 70.0
    } else {
        p * 480.0 - 90.0
    }
}

/// Wire byte to fader position through the fader law
pub fn fader_byte_to_position(byte: u8) -> f64 {
    db_to_position(fader_byte_to_db(byte))
}

/// Fader position to wire byte through the fader law
pub fn position_to_fader_byte(position: f64) -> u8 {
    db_to_fader_byte(position_to_db(position))
}

/// Plain linear map of a wire byte onto [0, 1]
pub fn fader_byte_to_position01(byte: u8) -> f64 {
    f64::from(byte.min(MAX_BYTE)) / f64::from(MAX_BYTE)
}

/// Inverse of [`fader_byte_to_position01`], rounded and clamped
pub fn position01_to_fader_byte(position: f64) -> u8 {
    if position.is_nan() {
        return 0;
    }
    (position.clamp(0.0, 1.0) * f64::from(MAX_BYTE)).round() as u8
}
