//! dLive MIDI protocol encoding
//!
//! Every outbound request is one [`ConsoleCommand`] variant; [`ConsoleCommand::encode`]
//! turns it into the exact bytes the console expects. The console listens on
//! five consecutive MIDI channels starting at the configured base channel;
//! bus group `n` lives on `base + n`.
//!
//! The inbound side decodes the vendor SysEx replies the bridge tracks.

use serde::Serialize;

use super::connection::ConsoleSource;
use crate::midi::{SYSEX_END, SYSEX_START};
use crate::state::nrpn::{
    CC_DATA_ENTRY, CC_NRPN_LSB, CC_NRPN_MSB, PARAM_DCA_ASSIGN, PARAM_FADER_LEVEL, PARAM_MAIN_MIX,
};
use crate::state::{Attribute, ParameterPath, MAX_BUS_GROUP};

/// Allen & Heath vendor header shared by every dLive SysEx
pub const SYSEX_HEADER: [u8; 8] = [SYSEX_START, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00];

/// SysEx command: request a channel name
pub const SYSEX_GET_NAME: u8 = 0x01;
/// SysEx command: channel name reply
pub const SYSEX_NAME_REPLY: u8 = 0x02;
/// SysEx command: set a channel name
pub const SYSEX_SET_NAME: u8 = 0x03;
/// SysEx command: mute status request, followed by [`MUTE_STATUS_QUERY`]
pub const SYSEX_REQUEST: u8 = 0x05;
/// SysEx command: preamp pad reply
pub const SYSEX_PAD_REPLY: u8 = 0x08;
/// SysEx command: preamp 48V reply
pub const SYSEX_PHANTOM_REPLY: u8 = 0x0B;
/// SysEx command: phantom power
pub const SYSEX_PHANTOM: u8 = 0x0C;
/// SysEx command: send level
pub const SYSEX_SEND_LEVEL: u8 = 0x0D;

/// Longest channel name the console stores
pub const MAX_NAME_LEN: usize = 8;
/// Number of DCAs addressable through the assign parameter
pub const DCA_COUNT: u8 = 24;
/// Number of mute groups addressable through the assign parameter
pub const MUTE_GROUP_COUNT: u8 = 8;
/// Highest surface cue list number
pub const MAX_CUE: u16 = 1999;
/// Controller the surface maps to Go/Next by default
pub const DEFAULT_GO_NEXT_CC: u8 = 80;
/// Controller the surface maps to Go/Previous by default
pub const DEFAULT_GO_PREVIOUS_CC: u8 = 81;
/// Controller carrying the UFX global key
pub const CC_UFX_KEY: u8 = 0x0C;
/// Controller carrying the UFX global scale
pub const CC_UFX_SCALE: u8 = 0x0D;

const MUTE_STATUS_QUERY: u8 = 0x09;
const ASSIGN_DCA_ON: u8 = 0x40;
const ASSIGN_MUTE_GROUP_ON: u8 = 0x58;
const ASSIGN_MUTE_GROUP_OFF: u8 = 0x18;

const UFX_KEYS: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

const ON: u8 = 0x7F;
const OFF: u8 = 0x3F;

/// Outbound console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Write a stored parameter (fader, send, mute or main mix assign)
    SetLevel { path: ParameterPath, value: u8 },
    /// Recall a scene, 1-based
    RecallScene { scene: u16 },
    /// Assign an input channel to a DCA (0-based) or remove it
    AssignDca { channel: u8, dca: u8, assign: bool },
    /// Switch 48V phantom power on a preamp socket
    SetPhantom { socket: u8, on: bool },
    /// Set preamp gain on a socket
    SetPreampGain { socket: u8, gain: u8 },
    /// Rename a channel; only printable ASCII is kept, up to eight characters
    SetChannelName { bus_group: u8, channel: u8, name: String },
    /// Ask the console to report a channel name
    RequestChannelName { bus_group: u8, channel: u8 },
    /// Assign an input channel to a mute group (0-based) or remove it
    AssignMuteGroup { channel: u8, group: u8, assign: bool },
    /// Ask the console to report a mute state
    RequestMuteStatus { bus_group: u8, channel: u8 },
    /// Set the UFX global key, 0 (C) to 11 (B)
    SetUfxKey { key: u8 },
    SetUfxScale { scale: UfxScale },
    /// Recall a surface cue list entry, 0 to [`MAX_CUE`]
    RecallCue { cue: u16 },
    /// Surface Go/Next on the controller configured for it
    GoNext { cc: u8 },
    /// Surface Go/Previous on the controller configured for it
    GoPrevious { cc: u8 },
    /// Bytes sent as-is
    Raw(Vec<u8>),
}

/// UFX global scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UfxScale {
    Major,
    Minor,
}

impl UfxScale {
    pub fn from_value(value: u8) -> Self {
        if value == 0 {
            UfxScale::Major
        } else {
            UfxScale::Minor
        }
    }

    fn value(self) -> u8 {
        match self {
            UfxScale::Major => 0,
            UfxScale::Minor => 1,
        }
    }
}

/// Name of a UFX key value, `None` above 11
pub fn ufx_key_name(key: u8) -> Option<&'static str> {
    UFX_KEYS.get(usize::from(key)).copied()
}

/// Key value for a name such as `F#`
pub fn ufx_key_from_name(name: &str) -> Option<u8> {
    UFX_KEYS
        .iter()
        .position(|k| k.eq_ignore_ascii_case(name))
        .map(|i| i as u8)
}

/// A channel's DCA or mute group membership as carried by NRPN 0x40
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// DCA, 0-based
    Dca { dca: u8, assigned: bool },
    /// Mute group, 0-based
    MuteGroup { group: u8, assigned: bool },
}

impl Assignment {
    /// Decode an assign parameter value; `None` for unused values
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0x00..=0x17 => Some(Assignment::Dca { dca: value, assigned: false }),
            0x18..=0x1F => Some(Assignment::MuteGroup {
                group: value - ASSIGN_MUTE_GROUP_OFF,
                assigned: false,
            }),
            0x40..=0x57 => Some(Assignment::Dca {
                dca: value - ASSIGN_DCA_ON,
                assigned: true,
            }),
            0x58..=0x5F => Some(Assignment::MuteGroup {
                group: value - ASSIGN_MUTE_GROUP_ON,
                assigned: true,
            }),
            _ => None,
        }
    }

    fn value(self) -> u8 {
        match self {
            Assignment::Dca { dca, assigned } => {
                let dca = dca.min(DCA_COUNT - 1);
                if assigned {
                    ASSIGN_DCA_ON + dca
                } else {
                    dca
                }
            }
            Assignment::MuteGroup { group, assigned } => {
                let group = group.min(MUTE_GROUP_COUNT - 1);
                if assigned {
                    ASSIGN_MUTE_GROUP_ON + group
                } else {
                    ASSIGN_MUTE_GROUP_OFF + group
                }
            }
        }
    }
}

impl ConsoleCommand {
    /// Encode for a console whose base MIDI channel is `base` (0-based)
    pub fn encode(&self, base: u8) -> Vec<u8> {
        match self {
            ConsoleCommand::SetLevel { path, value } => encode_level(path, *value, base),
            ConsoleCommand::RecallScene { scene } => {
                let index = scene.saturating_sub(1);
                let bank = ((index >> 7) & 0x7F) as u8;
                let program = (index & 0x7F) as u8;
                let ch = midi_channel(base, 0);
                vec![0xB0 | ch, 0x00, bank, 0xC0 | ch, program]
            }
            ConsoleCommand::AssignDca { channel, .. } | ConsoleCommand::AssignMuteGroup { channel, .. } => {
                let value = self.assignment().map_or(0, Assignment::value);
                nrpn(midi_channel(base, 0), *channel, PARAM_DCA_ASSIGN, value)
            }
            ConsoleCommand::SetPhantom { socket, on } => {
                let state = if *on { 0x7F } else { 0x00 };
                sysex(
                    midi_channel(base, 0),
                    SYSEX_PHANTOM,
                    &[*socket & 0x7F, state],
                )
            }
            ConsoleCommand::SetPreampGain { socket, gain } => {
                vec![0xE0 | midi_channel(base, 0), *socket & 0x7F, *gain & 0x7F]
            }
            ConsoleCommand::SetChannelName {
                bus_group,
                channel,
                name,
            } => {
                let mut payload = vec![*channel & 0x7F];
                payload.extend(sanitize_name(name).bytes());
                sysex(midi_channel(base, *bus_group), SYSEX_SET_NAME, &payload)
            }
            ConsoleCommand::RequestChannelName { bus_group, channel } => sysex(
                midi_channel(base, *bus_group),
                SYSEX_GET_NAME,
                &[*channel & 0x7F],
            ),
            ConsoleCommand::RequestMuteStatus { bus_group, channel } => sysex(
                midi_channel(base, *bus_group),
                SYSEX_REQUEST,
                &[MUTE_STATUS_QUERY, *channel & 0x7F],
            ),
            ConsoleCommand::SetUfxKey { key } => {
                vec![0xB0 | midi_channel(base, 0), CC_UFX_KEY, (*key).min(11)]
            }
            ConsoleCommand::SetUfxScale { scale } => {
                vec![0xB0 | midi_channel(base, 0), CC_UFX_SCALE, scale.value()]
            }
            ConsoleCommand::RecallCue { cue } => {
                let cue = (*cue).min(MAX_CUE);
                let ch = midi_channel(base, 0);
                vec![0xB0 | ch, 0x00, (cue / 128) as u8, 0xC0 | ch, (cue % 128) as u8]
            }
            ConsoleCommand::GoNext { cc } | ConsoleCommand::GoPrevious { cc } => {
                vec![0xB0 | midi_channel(base, 0), *cc & 0x7F, ON]
            }
            ConsoleCommand::Raw(bytes) => bytes.clone(),
        }
    }

    /// Port this command must go to; `None` lets the writer pick
    pub fn target(&self) -> Option<ConsoleSource> {
        match self {
            ConsoleCommand::RecallCue { .. }
            | ConsoleCommand::GoNext { .. }
            | ConsoleCommand::GoPrevious { .. } => Some(ConsoleSource::Surface),
            _ => None,
        }
    }

    /// Membership change carried by an assign command
    pub fn assignment(&self) -> Option<Assignment> {
        match *self {
            ConsoleCommand::AssignDca { dca, assign, .. } => Some(Assignment::Dca {
                dca: dca.min(DCA_COUNT - 1),
                assigned: assign,
            }),
            ConsoleCommand::AssignMuteGroup { group, assign, .. } => Some(Assignment::MuteGroup {
                group: group.min(MUTE_GROUP_COUNT - 1),
                assigned: assign,
            }),
            _ => None,
        }
    }

    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            ConsoleCommand::SetLevel { .. } => "set_level",
            ConsoleCommand::RecallScene { .. } => "recall_scene",
            ConsoleCommand::AssignDca { .. } => "assign_dca",
            ConsoleCommand::SetPhantom { .. } => "set_phantom",
            ConsoleCommand::SetPreampGain { .. } => "set_preamp_gain",
            ConsoleCommand::SetChannelName { .. } => "set_channel_name",
            ConsoleCommand::RequestChannelName { .. } => "request_channel_name",
            ConsoleCommand::AssignMuteGroup { .. } => "assign_mute_group",
            ConsoleCommand::RequestMuteStatus { .. } => "request_mute_status",
            ConsoleCommand::SetUfxKey { .. } => "set_ufx_key",
            ConsoleCommand::SetUfxScale { .. } => "set_ufx_scale",
            ConsoleCommand::RecallCue { .. } => "recall_cue",
            ConsoleCommand::GoNext { .. } => "go_next",
            ConsoleCommand::GoPrevious { .. } => "go_previous",
            ConsoleCommand::Raw(_) => "raw",
        }
    }
}

fn encode_level(path: &ParameterPath, value: u8, base: u8) -> Vec<u8> {
    let ch = midi_channel(base, path.bus_group);
    let value = value & 0x7F;
    match path.attribute {
        Attribute::FaderLevel => nrpn(ch, path.channel, PARAM_FADER_LEVEL, value),
        Attribute::SendLevel {
            sub_bus,
            sub_channel,
        } => sysex(
            ch,
            SYSEX_SEND_LEVEL,
            &[path.channel & 0x7F, sub_bus & 0x7F, sub_channel & 0x7F, value],
        ),
        Attribute::Mute => {
            let velocity = if value >= 0x40 { ON } else { OFF };
            let note = path.channel & 0x7F;
            vec![0x90 | ch, note, velocity, 0x90 | ch, note, 0x00]
        }
        Attribute::MainMixAssign => {
            let state = if value >= 0x40 { ON } else { OFF };
            nrpn(ch, path.channel, PARAM_MAIN_MIX, state)
        }
    }
}

/// MIDI channel carrying `bus_group`, wrapped to 0-15
fn midi_channel(base: u8, bus_group: u8) -> u8 {
    (base + bus_group.min(MAX_BUS_GROUP)) & 0x0F
}

fn nrpn(ch: u8, msb: u8, lsb: u8, value: u8) -> Vec<u8> {
    let status = 0xB0 | ch;
    vec![
        status,
        CC_NRPN_MSB,
        msb & 0x7F,
        status,
        CC_NRPN_LSB,
        lsb & 0x7F,
        status,
        CC_DATA_ENTRY,
        value & 0x7F,
    ]
}

fn sysex(ch: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SYSEX_HEADER.len() + payload.len() + 3);
    out.extend_from_slice(&SYSEX_HEADER);
    out.push(ch);
    out.push(command);
    out.extend_from_slice(payload);
    out.push(SYSEX_END);
    out
}

/// Printable ASCII only, at most [`MAX_NAME_LEN`] characters
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .take(MAX_NAME_LEN)
        .collect()
}

/// Mute state carried by a Note On velocity
///
/// The console sends each mute change as a note pair: the state on the first
/// note and velocity 0 on the second. The second note carries no state.
pub fn mute_from_velocity(velocity: u8) -> Option<u8> {
    match velocity {
        0 => None,
        v if v >= 0x40 => Some(0x7F),
        _ => Some(0),
    }
}

/// Vendor SysEx reply the bridge understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysExReply {
    SendLevel { path: ParameterPath, value: u8 },
    ChannelName { bus_group: u8, channel: u8, name: String },
    /// Preamp pad state of a socket
    Pad { socket: u8, on: bool },
    /// Preamp 48V state of a socket
    Phantom { socket: u8, on: bool },
}

impl SysExReply {
    /// Decode a full SysEx frame (F0 .. F7) from a console on base channel `base`
    pub fn parse(frame: &[u8], base: u8) -> Option<Self> {
        let body = frame.strip_prefix(&SYSEX_HEADER[..])?;
        let body = body.strip_suffix(&[SYSEX_END])?;
        let (&ch, body) = body.split_first()?;
        let bus_group = (ch & 0x0F).checked_sub(base).filter(|g| *g <= MAX_BUS_GROUP)?;
        let (&command, body) = body.split_first()?;

        match (command, body) {
            (SYSEX_SEND_LEVEL, &[channel, sub_bus, sub_channel, value]) => Some(SysExReply::SendLevel {
                path: ParameterPath::send(bus_group, channel, sub_bus, sub_channel),
                value,
            }),
            (SYSEX_NAME_REPLY, [channel, name @ ..]) => Some(SysExReply::ChannelName {
                bus_group,
                channel: *channel,
                name: String::from_utf8_lossy(name).trim_end_matches('\0').to_string(),
            }),
            (SYSEX_PAD_REPLY, &[socket, state]) => Some(SysExReply::Pad {
                socket,
                on: state == ON,
            }),
            (SYSEX_PHANTOM_REPLY, &[socket, state]) => Some(SysExReply::Phantom {
                socket,
                on: state == ON,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fader_level_is_nrpn_triple() {
        let cmd = ConsoleCommand::SetLevel {
            path: ParameterPath::fader(1, 12),
            value: 100,
        };
        assert_eq!(
            cmd.encode(0),
            vec![0xB1, 0x63, 12, 0xB1, 0x62, 0x17, 0xB1, 0x06, 100]
        );
    }

    #[test]
    fn test_send_level_sysex() {
        let cmd = ConsoleCommand::SetLevel {
            path: ParameterPath::send(2, 3, 1, 4),
            value: 0x50,
        };
        assert_eq!(
            cmd.encode(1),
            vec![0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x03, 0x0D, 3, 1, 4, 0x50, 0xF7]
        );
    }

    #[test]
    fn test_mute_note_pair() {
        let on = ConsoleCommand::SetLevel {
            path: ParameterPath::mute(0, 5),
            value: 127,
        };
        assert_eq!(on.encode(0), vec![0x90, 5, 0x7F, 0x90, 5, 0x00]);

        let off = ConsoleCommand::SetLevel {
            path: ParameterPath::mute(3, 5),
            value: 0,
        };
        assert_eq!(off.encode(0), vec![0x93, 5, 0x3F, 0x93, 5, 0x00]);
    }

    #[test]
    fn test_main_mix_assign() {
        let cmd = ConsoleCommand::SetLevel {
            path: ParameterPath::main_mix(0, 7),
            value: 127,
        };
        assert_eq!(
            cmd.encode(0),
            vec![0xB0, 0x63, 7, 0xB0, 0x62, 0x18, 0xB0, 0x06, 0x7F]
        );
    }

    #[test]
    fn test_scene_recall_banks() {
        assert_eq!(
            ConsoleCommand::RecallScene { scene: 1 }.encode(0),
            vec![0xB0, 0x00, 0, 0xC0, 0]
        );
        assert_eq!(
            ConsoleCommand::RecallScene { scene: 130 }.encode(2),
            vec![0xB2, 0x00, 1, 0xC2, 1]
        );
        assert_eq!(
            ConsoleCommand::RecallScene { scene: 0 }.encode(0),
            vec![0xB0, 0x00, 0, 0xC0, 0]
        );
    }

    #[test]
    fn test_dca_assign() {
        let assign = ConsoleCommand::AssignDca {
            channel: 4,
            dca: 2,
            assign: true,
        };
        assert_eq!(
            assign.encode(0),
            vec![0xB0, 0x63, 4, 0xB0, 0x62, 0x40, 0xB0, 0x06, 0x42]
        );

        let remove = ConsoleCommand::AssignDca {
            channel: 4,
            dca: 2,
            assign: false,
        };
        assert_eq!(remove.encode(0)[8], 0x02);
    }

    #[test]
    fn test_phantom_and_gain() {
        assert_eq!(
            ConsoleCommand::SetPhantom { socket: 9, on: true }.encode(0),
            vec![0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x00, 0x0C, 9, 0x7F, 0xF7]
        );
        assert_eq!(
            ConsoleCommand::SetPreampGain { socket: 9, gain: 0x40 }.encode(0),
            vec![0xE0, 9, 0x40]
        );
    }

    #[test]
    fn test_channel_name() {
        let cmd = ConsoleCommand::SetChannelName {
            bus_group: 0,
            channel: 2,
            name: "Lead\tVocals".to_string(),
        };
        let bytes = cmd.encode(0);
        assert_eq!(&bytes[..11], &[0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x00, 0x03, 2]);
        assert_eq!(&bytes[11..bytes.len() - 1], b"LeadVoca");
        assert_eq!(bytes.last(), Some(&0xF7));

        let request = ConsoleCommand::RequestChannelName {
            bus_group: 1,
            channel: 2,
        };
        assert_eq!(
            request.encode(0),
            vec![0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x01, 0x01, 2, 0xF7]
        );
    }

    #[test]
    fn test_mute_group_assign() {
        let assign = ConsoleCommand::AssignMuteGroup {
            channel: 4,
            group: 2,
            assign: true,
        };
        assert_eq!(assign.encode(0)[8], 0x5A);

        let remove = ConsoleCommand::AssignMuteGroup {
            channel: 4,
            group: 2,
            assign: false,
        };
        assert_eq!(remove.encode(0)[8], 0x1A);
    }

    #[test]
    fn test_assignment_values() {
        assert_eq!(Assignment::from_value(0x42), Some(Assignment::Dca { dca: 2, assigned: true }));
        assert_eq!(Assignment::from_value(0x17), Some(Assignment::Dca { dca: 23, assigned: false }));
        assert_eq!(
            Assignment::from_value(0x5F),
            Some(Assignment::MuteGroup { group: 7, assigned: true })
        );
        assert_eq!(
            Assignment::from_value(0x18),
            Some(Assignment::MuteGroup { group: 0, assigned: false })
        );
        assert_eq!(Assignment::from_value(0x20), None);
        assert_eq!(Assignment::from_value(0x60), None);
    }

    #[test]
    fn test_surface_cue_commands() {
        let cue = ConsoleCommand::RecallCue { cue: 300 };
        assert_eq!(cue.encode(1), vec![0xB1, 0x00, 2, 0xC1, 44]);
        assert_eq!(cue.target(), Some(ConsoleSource::Surface));

        let next = ConsoleCommand::GoNext { cc: DEFAULT_GO_NEXT_CC };
        assert_eq!(next.encode(0), vec![0xB0, 80, 0x7F]);
        assert_eq!(next.target(), Some(ConsoleSource::Surface));
        assert_eq!(
            ConsoleCommand::GoPrevious { cc: DEFAULT_GO_PREVIOUS_CC }.encode(0),
            vec![0xB0, 81, 0x7F]
        );

        assert_eq!(ConsoleCommand::RecallScene { scene: 1 }.target(), None);
    }

    #[test]
    fn test_ufx_and_mute_status() {
        assert_eq!(ConsoleCommand::SetUfxKey { key: 6 }.encode(0), vec![0xB0, 0x0C, 6]);
        assert_eq!(
            ConsoleCommand::SetUfxScale { scale: UfxScale::Minor }.encode(2),
            vec![0xB2, 0x0D, 1]
        );
        assert_eq!(ufx_key_name(6), Some("F#"));
        assert_eq!(ufx_key_name(12), None);
        assert_eq!(ufx_key_from_name("a#"), Some(10));
        assert_eq!(UfxScale::from_value(0), UfxScale::Major);

        assert_eq!(
            ConsoleCommand::RequestMuteStatus { bus_group: 1, channel: 7 }.encode(0),
            vec![0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x01, 0x05, 0x09, 7, 0xF7]
        );
    }

    #[test]
    fn test_parse_preamp_replies() {
        let mut phantom = SYSEX_HEADER.to_vec();
        phantom.extend_from_slice(&[0x00, 0x0B, 9, 0x7F, 0xF7]);
        assert_eq!(
            SysExReply::parse(&phantom, 0),
            Some(SysExReply::Phantom { socket: 9, on: true })
        );

        let mut pad = SYSEX_HEADER.to_vec();
        pad.extend_from_slice(&[0x00, 0x08, 3, 0x00, 0xF7]);
        assert_eq!(SysExReply::parse(&pad, 0), Some(SysExReply::Pad { socket: 3, on: false }));
    }

    #[test]
    fn test_mute_from_velocity() {
        assert_eq!(mute_from_velocity(0x7F), Some(0x7F));
        assert_eq!(mute_from_velocity(0x40), Some(0x7F));
        assert_eq!(mute_from_velocity(0x3F), Some(0));
        assert_eq!(mute_from_velocity(1), Some(0));
        assert_eq!(mute_from_velocity(0), None);
    }

    #[test]
    fn test_parse_send_level_reply() {
        let frame = [0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x03, 0x0D, 3, 1, 4, 0x50, 0xF7];
        assert_eq!(
            SysExReply::parse(&frame, 1),
            Some(SysExReply::SendLevel {
                path: ParameterPath::send(2, 3, 1, 4),
                value: 0x50,
            })
        );
        // Bus group outside the window
        assert_eq!(SysExReply::parse(&frame, 4), None);
    }

    #[test]
    fn test_parse_name_reply() {
        let mut frame = SYSEX_HEADER.to_vec();
        frame.extend_from_slice(&[0x00, 0x02, 5]);
        frame.extend_from_slice(b"Kick");
        frame.push(0xF7);

        assert_eq!(
            SysExReply::parse(&frame, 0),
            Some(SysExReply::ChannelName {
                bus_group: 0,
                channel: 5,
                name: "Kick".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_foreign_sysex() {
        assert_eq!(SysExReply::parse(&[0xF0, 0x7E, 0x00, 0x06, 0x01, 0xF7], 0), None);
        let short = [0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x00, 0x0D, 1, 0xF7];
        assert_eq!(SysExReply::parse(&short, 0), None);
    }
}
