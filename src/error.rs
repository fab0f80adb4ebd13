//! Library error types

use thiserror::Error;

/// Failure to hand bytes to a console connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{0} is not connected")]
    NotConnected(String),

    #[error("{0} connection closed")]
    Closed(String),
}

/// Failure to parse a parameter path key such as `0/12/faderLevel`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    #[error("path '{0}' has the wrong number of segments")]
    Shape(String),

    #[error("invalid number '{segment}' in path '{path}'")]
    Number { path: String, segment: String },

    #[error("bus group {0} is outside 0-4")]
    BusGroup(u8),

    #[error("value {0} is outside 0-127")]
    OutOfRange(u8),

    #[error("unknown attribute '{0}'")]
    Attribute(String),
}
