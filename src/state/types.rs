//! Parameter addressing
//!
//! A console parameter is identified by its bus group (the MIDI channel offset
//! from the base channel), the channel within that group, and what is being
//! controlled on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathParseError;

/// Highest bus group offset; the console listens on five consecutive MIDI channels
pub const MAX_BUS_GROUP: u8 = 4;

/// What a path controls on its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Channel fader
    FaderLevel,
    /// Send level from this channel into another bus
    SendLevel { sub_bus: u8, sub_channel: u8 },
    /// Mute on (127) or off (0)
    Mute,
    /// Main mix assignment on (127) or off (0)
    MainMixAssign,
}

impl Attribute {
    /// Attributes stored as on/off rather than as a level
    pub fn is_switch(&self) -> bool {
        matches!(self, Attribute::Mute | Attribute::MainMixAssign)
    }
}

/// Key of one entry in the parameter store
///
/// Renders as `0/12/faderLevel`, `2/3/sendLevel/1/4`, `0/5/mute` or
/// `0/5/mainMixAssign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterPath {
    pub bus_group: u8,
    pub channel: u8,
    pub attribute: Attribute,
}

impl ParameterPath {
    pub fn new(bus_group: u8, channel: u8, attribute: Attribute) -> Self {
        Self {
            bus_group,
            channel,
            attribute,
        }
    }

    pub fn fader(bus_group: u8, channel: u8) -> Self {
        Self::new(bus_group, channel, Attribute::FaderLevel)
    }

    pub fn send(bus_group: u8, channel: u8, sub_bus: u8, sub_channel: u8) -> Self {
        Self::new(
            bus_group,
            channel,
            Attribute::SendLevel {
                sub_bus,
                sub_channel,
            },
        )
    }

    pub fn mute(bus_group: u8, channel: u8) -> Self {
        Self::new(bus_group, channel, Attribute::Mute)
    }

    pub fn main_mix(bus_group: u8, channel: u8) -> Self {
        Self::new(bus_group, channel, Attribute::MainMixAssign)
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/", self.bus_group, self.channel)?;
        match self.attribute {
            Attribute::FaderLevel => f.write_str("faderLevel"),
            Attribute::SendLevel {
                sub_bus,
                sub_channel,
            } => write!(f, "sendLevel/{}/{}", sub_bus, sub_channel),
            Attribute::Mute => f.write_str("mute"),
            Attribute::MainMixAssign => f.write_str("mainMixAssign"),
        }
    }
}

impl FromStr for ParameterPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() < 3 {
            return Err(PathParseError::Shape(s.to_string()));
        }

        let number = |segment: &str| -> Result<u8, PathParseError> {
            let value: u8 = segment.parse().map_err(|_| PathParseError::Number {
                path: s.to_string(),
                segment: segment.to_string(),
            })?;
            if value > 0x7F {
                return Err(PathParseError::OutOfRange(value));
            }
            Ok(value)
        };

        let bus_group = number(parts[0])?;
        if bus_group > MAX_BUS_GROUP {
            return Err(PathParseError::BusGroup(bus_group));
        }
        let channel = number(parts[1])?;

        let attribute = match (parts[2], parts.len()) {
            ("faderLevel", 3) => Attribute::FaderLevel,
            ("mute", 3) => Attribute::Mute,
            ("mainMixAssign", 3) => Attribute::MainMixAssign,
            ("sendLevel", 5) => Attribute::SendLevel {
                sub_bus: number(parts[3])?,
                sub_channel: number(parts[4])?,
            },
            ("faderLevel" | "mute" | "mainMixAssign" | "sendLevel", _) => {
                return Err(PathParseError::Shape(s.to_string()))
            }
            (other, _) => return Err(PathParseError::Attribute(other.to_string())),
        };

        Ok(Self::new(bus_group, channel, attribute))
    }
}

impl TryFrom<String> for ParameterPath {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParameterPath> for String {
    fn from(path: ParameterPath) -> Self {
        path.to_string()
    }
}
