//! NRPN selector state machine
//!
//! The console writes parameters as `63 <channel>`, `62 <parameter>`,
//! `06 <value>` and may send the two selectors once followed by any number of
//! data-entry writes. Selectors therefore persist across data entries and
//! across unrelated controllers; only [`NrpnAssembler::reset`] clears them.

use tracing::trace;

use super::types::{ParameterPath, MAX_BUS_GROUP};

/// Controller carrying the channel select (NRPN MSB)
pub const CC_NRPN_MSB: u8 = 0x63;
/// Controller carrying the parameter select (NRPN LSB)
pub const CC_NRPN_LSB: u8 = 0x62;
/// Data entry controller
pub const CC_DATA_ENTRY: u8 = 0x06;

/// Parameter number of a channel fader level
pub const PARAM_FADER_LEVEL: u8 = 0x17;
/// Parameter number of a main mix assignment
pub const PARAM_MAIN_MIX: u8 = 0x18;
/// Parameter number of DCA and mute group assignment
pub const PARAM_DCA_ASSIGN: u8 = 0x40;

/// Where the assembler is in the select/select/write sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NrpnState {
    Idle,
    ChannelSelected,
    ParameterSelected,
}

/// One completed data-entry write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NrpnEvent {
    pub bus_group: u8,
    pub msb: u8,
    pub lsb: u8,
    pub value: u8,
}

impl NrpnEvent {
    /// Store entry for this write, if the parameter number is one we track
    ///
    /// Switch parameters are normalised to 0 or 127.
    pub fn parameter(&self) -> Option<(ParameterPath, u8)> {
        match self.lsb {
            PARAM_FADER_LEVEL => Some((ParameterPath::fader(self.bus_group, self.msb), self.value)),
            PARAM_MAIN_MIX => Some((
                ParameterPath::main_mix(self.bus_group, self.msb),
                if self.value >= 0x40 { 0x7F } else { 0 },
            )),
            _ => None,
        }
    }
}

/// Per-source NRPN assembler
#[derive(Debug, Clone)]
pub struct NrpnAssembler {
    /// Zero-based MIDI channel of bus group 0
    base_channel: u8,
    msb: Option<u8>,
    lsb: Option<u8>,
}

impl NrpnAssembler {
    pub fn new(base_channel: u8) -> Self {
        Self {
            base_channel: base_channel & 0x0F,
            msb: None,
            lsb: None,
        }
    }

    pub fn state(&self) -> NrpnState {
        match (self.msb, self.lsb) {
            (Some(_), Some(_)) => NrpnState::ParameterSelected,
            (Some(_), None) => NrpnState::ChannelSelected,
            _ => NrpnState::Idle,
        }
    }

    /// Feed one Control Change; returns an event on data entry with both
    /// selectors pending and a channel inside the bus group window
    pub fn handle_cc(&mut self, channel: u8, cc: u8, value: u8) -> Option<NrpnEvent> {
        match cc {
            CC_NRPN_MSB => {
                self.msb = Some(value);
                None
            }
            CC_NRPN_LSB => {
                self.lsb = Some(value);
                None
            }
            CC_DATA_ENTRY => {
                let (msb, lsb) = (self.msb?, self.lsb?);
                let bus_group = self.bus_group(channel)?;
                let event = NrpnEvent {
                    bus_group,
                    msb,
                    lsb,
                    value,
                };
                trace!(?event, "NRPN data entry");
                Some(event)
            }
            _ => None,
        }
    }

    /// Bus group for a zero-based MIDI channel, `None` outside the window
    pub fn bus_group(&self, channel: u8) -> Option<u8> {
        channel
            .checked_sub(self.base_channel)
            .filter(|group| *group <= MAX_BUS_GROUP)
    }

    /// Forget both selectors
    pub fn reset(&mut self) {
        self.msb = None;
        self.lsb = None;
    }
}
