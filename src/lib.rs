//! dLive bridge - control an Allen & Heath dLive console over MIDI-over-TCP
//!
//! Decodes the console's MIDI stream into a parameter store, encodes
//! commands back to it, and runs eased fades on a fixed tick.

pub mod cli;
pub mod codec;
pub mod config;
pub mod console;
pub mod easing;
pub mod error;
pub mod fades;
pub mod midi;
pub mod sniffer;
pub mod state;
