//! Easing curves for parameter fades
//!
//! Stateless functions mapping fade progress in [0, 1] to an eased fraction.
//! Every curve starts at 0 and ends at 1. `Back` and `Elastic` overshoot in
//! between; the scheduler clamps on the wire, not here.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Curve family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EasingKind {
    #[default]
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Sinusoidal,
    Exponential,
    Circular,
    Elastic,
    Back,
    Bounce,
}

impl EasingKind {
    /// All curve families
    pub fn all() -> &'static [EasingKind] {
        &[
            EasingKind::Linear,
            EasingKind::Quadratic,
            EasingKind::Cubic,
            EasingKind::Quartic,
            EasingKind::Quintic,
            EasingKind::Sinusoidal,
            EasingKind::Exponential,
            EasingKind::Circular,
            EasingKind::Elastic,
            EasingKind::Back,
            EasingKind::Bounce,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EasingKind::Linear => "linear",
            EasingKind::Quadratic => "quadratic",
            EasingKind::Cubic => "cubic",
            EasingKind::Quartic => "quartic",
            EasingKind::Quintic => "quintic",
            EasingKind::Sinusoidal => "sinusoidal",
            EasingKind::Exponential => "exponential",
            EasingKind::Circular => "circular",
            EasingKind::Elastic => "elastic",
            EasingKind::Back => "back",
            EasingKind::Bounce => "bounce",
        }
    }
}

impl fmt::Display for EasingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EasingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EasingKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown fade algorithm '{}'", s))
    }
}

/// Which end(s) of the curve are eased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EasingVariant {
    #[serde(rename = "ease-in")]
    In,
    #[serde(rename = "ease-out")]
    Out,
    #[default]
    #[serde(rename = "ease-in-out")]
    InOut,
}

impl EasingVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            EasingVariant::In => "ease-in",
            EasingVariant::Out => "ease-out",
            EasingVariant::InOut => "ease-in-out",
        }
    }
}

impl fmt::Display for EasingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EasingVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ease-in" | "in" => Ok(EasingVariant::In),
            "ease-out" | "out" => Ok(EasingVariant::Out),
            "ease-in-out" | "in-out" | "inout" => Ok(EasingVariant::InOut),
            _ => Err(format!("unknown fade curve '{}'", s)),
        }
    }
}

/// A complete curve choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Easing {
    pub kind: EasingKind,
    pub variant: EasingVariant,
}

impl Easing {
    pub const LINEAR: Easing = Easing {
        kind: EasingKind::Linear,
        variant: EasingVariant::InOut,
    };

    pub fn new(kind: EasingKind, variant: EasingVariant) -> Self {
        Self { kind, variant }
    }

    /// Eased fraction for progress `t`
    pub fn apply(&self, t: f64) -> f64 {
        ease(self.kind, self.variant, t)
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EasingKind::Linear => f.write_str("linear"),
            kind => write!(f, "{} {}", kind, self.variant),
        }
    }
}

/// Eased fraction for progress `t`; `t` is clamped to [0, 1]
pub fn ease(kind: EasingKind, variant: EasingVariant, t: f64) -> f64 {
    let k = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    use EasingVariant::{In, InOut, Out};
    match (kind, variant) {
        (EasingKind::Linear, _) => k,

        (EasingKind::Quadratic, In) => k * k,
        (EasingKind::Quadratic, Out) => k * (2.0 - k),
        (EasingKind::Quadratic, InOut) => {
            let k = k * 2.0;
            if k < 1.0 {
                0.5 * k * k
            } else {
                let k = k - 1.0;
                -0.5 * (k * (k - 2.0) - 1.0)
            }
        }

        (EasingKind::Cubic, In) => k.powi(3),
        (EasingKind::Cubic, Out) => (k - 1.0).powi(3) + 1.0,
        (EasingKind::Cubic, InOut) => in_out_power(k, 3),

        (EasingKind::Quartic, In) => k.powi(4),
        (EasingKind::Quartic, Out) => 1.0 - (k - 1.0).powi(4),
        (EasingKind::Quartic, InOut) => {
            let k = k * 2.0;
            if k < 1.0 {
                0.5 * k.powi(4)
            } else {
                -0.5 * ((k - 2.0).powi(4) - 2.0)
            }
        }

        (EasingKind::Quintic, In) => k.powi(5),
        (EasingKind::Quintic, Out) => (k - 1.0).powi(5) + 1.0,
        (EasingKind::Quintic, InOut) => in_out_power(k, 5),

        (EasingKind::Sinusoidal, In) => 1.0 - (k * PI / 2.0).cos(),
        (EasingKind::Sinusoidal, Out) => (k * PI / 2.0).sin(),
        (EasingKind::Sinusoidal, InOut) => 0.5 * (1.0 - (PI * k).cos()),

        (EasingKind::Exponential, In) => {
            if k == 0.0 {
                0.0
            } else {
                1024f64.powf(k - 1.0)
            }
        }
        (EasingKind::Exponential, Out) => {
            if k == 1.0 {
                1.0
            } else {
                1.0 - 2f64.powf(-10.0 * k)
            }
        }
        (EasingKind::Exponential, InOut) => {
            if k == 0.0 || k == 1.0 {
                return k;
            }
            let k = k * 2.0;
            if k < 1.0 {
                0.5 * 1024f64.powf(k - 1.0)
            } else {
                0.5 * (2.0 - 2f64.powf(-10.0 * (k - 1.0)))
            }
        }

        (EasingKind::Circular, In) => 1.0 - (1.0 - k * k).sqrt(),
        (EasingKind::Circular, Out) => {
            let k = k - 1.0;
            (1.0 - k * k).sqrt()
        }
        (EasingKind::Circular, InOut) => {
            let k = k * 2.0;
            if k < 1.0 {
                -0.5 * ((1.0 - k * k).sqrt() - 1.0)
            } else {
                let k = k - 2.0;
                0.5 * ((1.0 - k * k).sqrt() + 1.0)
            }
        }

        (EasingKind::Elastic, In) => {
            if k == 0.0 || k == 1.0 {
                return k;
            }
            -elastic_wave(k - 1.0, 10.0)
        }
        (EasingKind::Elastic, Out) => {
            if k == 0.0 || k == 1.0 {
                return k;
            }
            elastic_wave(k, -10.0) + 1.0
        }
        (EasingKind::Elastic, InOut) => {
            if k == 0.0 || k == 1.0 {
                return k;
            }
            let k = k * 2.0 - 1.0;
            if k < 0.0 {
                -0.5 * elastic_wave(k, 10.0)
            } else {
                0.5 * elastic_wave(k, -10.0) + 1.0
            }
        }

        (EasingKind::Back, In) => {
            let s = BACK_OVERSHOOT;
            k * k * ((s + 1.0) * k - s)
        }
        (EasingKind::Back, Out) => {
            let s = BACK_OVERSHOOT;
            let k = k - 1.0;
            k * k * ((s + 1.0) * k + s) + 1.0
        }
        (EasingKind::Back, InOut) => {
            let s = BACK_OVERSHOOT * 1.525;
            let k = k * 2.0;
            if k < 1.0 {
                0.5 * (k * k * ((s + 1.0) * k - s))
            } else {
                let k = k - 2.0;
                0.5 * (k * k * ((s + 1.0) * k + s) + 2.0)
            }
        }

        (EasingKind::Bounce, In) => 1.0 - bounce_out(1.0 - k),
        (EasingKind::Bounce, Out) => bounce_out(k),
        (EasingKind::Bounce, InOut) => {
            if k < 0.5 {
                (1.0 - bounce_out(1.0 - k * 2.0)) * 0.5
            } else {
                bounce_out(k * 2.0 - 1.0) * 0.5 + 0.5
            }
        }
    }
}

const BACK_OVERSHOOT: f64 = 1.70158;
const ELASTIC_PERIOD: f64 = 0.4;

fn in_out_power(k: f64, power: i32) -> f64 {
    let k = k * 2.0;
    if k < 1.0 {
        0.5 * k.powi(power)
    } else {
        0.5 * ((k - 2.0).powi(power) + 2.0)
    }
}

/// Damped sine shared by the elastic curves (amplitude 1, period 0.4)
fn elastic_wave(k: f64, exponent: f64) -> f64 {
    let shift = ELASTIC_PERIOD / 4.0;
    2f64.powf(exponent * k) * ((k - shift) * (2.0 * PI) / ELASTIC_PERIOD).sin()
}

fn bounce_out(k: f64) -> f64 {
    const N: f64 = 7.5625;
    const D: f64 = 2.75;
    if k < 1.0 / D {
        N * k * k
    } else if k < 2.0 / D {
        let k = k - 1.5 / D;
        N * k * k + 0.75
    } else if k < 2.5 / D {
        let k = k - 2.25 / D;
        N * k * k + 0.9375
    } else {
        let k = k - 2.625 / D;
        N * k * k + 0.984375
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANTS: [EasingVariant; 3] = [EasingVariant::In, EasingVariant::Out, EasingVariant::InOut];

    #[test]
    fn test_all_curves_hit_end_points() {
        for &kind in EasingKind::all() {
            for variant in VARIANTS {
                let start = ease(kind, variant, 0.0);
                let end = ease(kind, variant, 1.0);
                assert!(start.abs() < 1e-9, "{kind} {variant} starts at {start}");
                assert!((end - 1.0).abs() < 1e-9, "{kind} {variant} ends at {end}");
            }
        }
    }

    #[test]
    fn test_linear_ignores_variant() {
        for variant in VARIANTS {
            assert_eq!(ease(EasingKind::Linear, variant, 0.3), 0.3);
        }
    }

    #[test]
    fn test_power_curves_are_monotonic() {
        let kinds = [
            EasingKind::Quadratic,
            EasingKind::Cubic,
            EasingKind::Quartic,
            EasingKind::Quintic,
            EasingKind::Sinusoidal,
            EasingKind::Exponential,
            EasingKind::Circular,
        ];
        for kind in kinds {
            for variant in VARIANTS {
                let samples: Vec<f64> = (0..=100).map(|i| ease(kind, variant, i as f64 / 100.0)).collect();
                assert!(
                    samples.windows(2).all(|w| w[0] <= w[1] + 1e-12),
                    "{kind} {variant} is not monotonic"
                );
            }
        }
    }

    #[test]
    fn test_in_and_out_are_mirrored() {
        for t in [0.1, 0.35, 0.8] {
            let eased_in = ease(EasingKind::Cubic, EasingVariant::In, t);
            let eased_out = ease(EasingKind::Cubic, EasingVariant::Out, 1.0 - t);
            assert!((eased_in - (1.0 - eased_out)).abs() < 1e-12);
        }
        assert!((ease(EasingKind::Quadratic, EasingVariant::InOut, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_back_overshoots() {
        assert!(ease(EasingKind::Back, EasingVariant::In, 0.2) < 0.0);
        assert!(ease(EasingKind::Back, EasingVariant::Out, 0.8) > 1.0);
    }

    #[test]
    fn test_elastic_overshoots() {
        let peak = (1..100)
            .map(|i| ease(EasingKind::Elastic, EasingVariant::Out, i as f64 / 100.0))
            .fold(f64::MIN, f64::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_bounce_stays_in_range() {
        for i in 0..=100 {
            let v = ease(EasingKind::Bounce, EasingVariant::Out, i as f64 / 100.0);
            assert!((0.0..=1.0 + 1e-9).contains(&v));
        }
    }

    #[test]
    fn test_out_of_range_progress_is_clamped() {
        assert_eq!(ease(EasingKind::Cubic, EasingVariant::In, -1.0), 0.0);
        assert_eq!(ease(EasingKind::Cubic, EasingVariant::In, 2.0), 1.0);
        assert_eq!(ease(EasingKind::Cubic, EasingVariant::In, f64::NAN), 0.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Cubic".parse::<EasingKind>().unwrap(), EasingKind::Cubic);
        assert_eq!("ease-in-out".parse::<EasingVariant>().unwrap(), EasingVariant::InOut);
        assert!("wobble".parse::<EasingKind>().is_err());

        let easing: Easing = serde_json::from_str(r#"{"kind":"bounce","variant":"ease-out"}"#).unwrap();
        assert_eq!(easing, Easing::new(EasingKind::Bounce, EasingVariant::Out));
    }
}
