//! MIDI message types
//!
//! Provides the wire message enum exchanged with the console, its encoding,
//! and the streaming decoder that rebuilds messages from TCP byte chunks.

pub mod decoder;

use std::fmt;

pub use decoder::{
    DecoderStats, MidiStreamDecoder, StatusByte, DEFAULT_MAX_SYSEX_LEN, MIN_SYSEX_LEN,
};

/// SysEx start byte
pub const SYSEX_START: u8 = 0xF0;
/// SysEx end byte
pub const SYSEX_END: u8 = 0xF7;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    ///
    /// Velocity 0 is kept as a Note On; the console uses it as the release
    /// half of its mute note pair.
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// System Exclusive: the full frame, 0xF0 through 0xF7 inclusive
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse one complete MIDI frame
    ///
    /// The first byte must be a status byte. Running status is the
    /// decoder's job, not this function's.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        if status < 0x80 {
            return None;
        }

        if status == SYSEX_START {
            let end = data.iter().position(|&b| b == SYSEX_END)?;
            return Some(MidiMessage::SysEx {
                data: data[..=end].to_vec(),
            });
        }

        if status >= 0xF0 {
            return None;
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: d1?,
                velocity: d2?,
            }),
            0x90 => Some(MidiMessage::NoteOn {
                channel,
                note: d1?,
                velocity: d2?,
            }),
            0xA0 => Some(MidiMessage::PolyPressure {
                channel,
                note: d1?,
                pressure: d2?,
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                cc: d1?,
                value: d2?,
            }),
            0xC0 => Some(MidiMessage::ProgramChange {
                channel,
                program: d1?,
            }),
            0xD0 => Some(MidiMessage::ChannelPressure {
                channel,
                pressure: d1?,
            }),
            0xE0 => {
                let lsb = d1? as u16;
                let msb = d2? as u16;
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![0xA0 | (channel & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
            MidiMessage::SysEx { ref data } => data.clone(),
        }
    }

    /// Get the channel for channel messages (0-15), None for SysEx
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::SysEx { .. } => None,
        }
    }

    /// Short lowercase name, used in logs and the sniffer
    pub fn kind(&self) -> &'static str {
        match self {
            MidiMessage::NoteOff { .. } => "note_off",
            MidiMessage::NoteOn { .. } => "note_on",
            MidiMessage::PolyPressure { .. } => "poly_pressure",
            MidiMessage::ControlChange { .. } => "control_change",
            MidiMessage::ProgramChange { .. } => "program_change",
            MidiMessage::ChannelPressure { .. } => "channel_pressure",
            MidiMessage::PitchBend { .. } => "pitch_bend",
            MidiMessage::SysEx { .. } => "sysex",
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx {} bytes", data.len())
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
