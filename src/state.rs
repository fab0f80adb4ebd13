//! Console parameter state
//!
//! Holds the parameter addressing types, the path-keyed value store shared by
//! inbound decoding and outbound fades, and the NRPN selector state machine
//! that turns console feedback into store updates.

pub mod nrpn;
mod store;
mod types;

pub use nrpn::{NrpnAssembler, NrpnEvent, NrpnState};
pub use store::ParameterStore;
pub use types::{Attribute, ParameterPath, MAX_BUS_GROUP};
