//! Messages understood by the console actor
//!
//! Like the rest of the actor plumbing, messages split into fire-and-forget
//! updates (socket data, fades, writes) and queries that answer through a
//! oneshot channel.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;

use super::connection::ConsoleSource;
use super::protocol::{ConsoleCommand, UfxScale};
use super::transport::Transport;
use crate::easing::Easing;
use crate::state::ParameterPath;

/// Fade curve and interpolation mode used when a request leaves them unset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeDefaults {
    pub easing: Easing,
    pub map_db: bool,
}

impl Default for FadeDefaults {
    fn default() -> Self {
        Self {
            easing: Easing::LINEAR,
            map_db: true,
        }
    }
}

/// Request to move a parameter to a new value over time
#[derive(Debug, Clone, PartialEq)]
pub struct FadeRequest {
    pub path: ParameterPath,
    pub to: u8,
    pub duration_ms: f64,
    pub easing: Option<Easing>,
    pub map_db: Option<bool>,
}

impl FadeRequest {
    /// Fade with the configured defaults
    pub fn new(path: ParameterPath, to: u8, duration_ms: f64) -> Self {
        Self {
            path,
            to,
            duration_ms,
            easing: None,
            map_db: None,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_map_db(mut self, map_db: bool) -> Self {
        self.map_db = Some(map_db);
        self
    }
}

/// Connection state of one console port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source: ConsoleSource,
    pub connected: bool,
    pub messages: u64,
    pub dropped_bytes: u64,
    pub oversize_sysex: u64,
}

/// Snapshot of the actor's counters and console-reported state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleStatus {
    pub sources: Vec<SourceStatus>,
    pub messages_out: u64,
    pub write_failures: u64,
    pub parameters: usize,
    pub active_fades: usize,
    pub tick_interval_ms: u64,
    pub max_sysex_len: usize,
    pub last_scene: Option<u16>,
    /// Keyed by `busGroup/channel`
    pub channel_names: BTreeMap<String, String>,
    /// Preamp gain by socket, as last reported by the console
    pub preamp_gains: BTreeMap<u8, u8>,
    /// 48V state by socket
    pub phantom: BTreeMap<u8, bool>,
    /// Pad state by socket
    pub pad: BTreeMap<u8, bool>,
    /// Assigned DCAs (1-based) by input channel
    pub dca_assignments: BTreeMap<u8, BTreeSet<u8>>,
    /// Assigned mute groups (1-based) by input channel
    pub mute_group_assignments: BTreeMap<u8, BTreeSet<u8>>,
    /// UFX global key name, `C` to `B`
    pub ufx_key: Option<String>,
    pub ufx_scale: Option<UfxScale>,
}

/// Commands for the console actor
pub enum ConsoleMessage {
    // -------------------------------------------------------------------------
    // Fire and forget
    // -------------------------------------------------------------------------
    /// Bytes read from a console socket
    Inbound { source: ConsoleSource, data: Bytes },

    /// A console socket connected or dropped
    ConnectionChanged { source: ConsoleSource, connected: bool },

    /// Register the write side of a console socket
    AttachTransport {
        source: ConsoleSource,
        transport: Arc<dyn Transport>,
    },

    Fade(FadeRequest),

    /// Write a command now, cancelling any fade on the same parameter
    ///
    /// `target` pins the write to one port; `None` uses the command's own
    /// routing.
    Send {
        command: ConsoleCommand,
        target: Option<ConsoleSource>,
    },

    SetTickInterval(u64),
    SetMaxSysexLen(usize),
    SetFadeDefaults(FadeDefaults),
    StopAllFades,
    Shutdown,

    // -------------------------------------------------------------------------
    // Request-response
    // -------------------------------------------------------------------------
    GetValue {
        path: ParameterPath,
        response: oneshot::Sender<Option<u8>>,
    },

    Snapshot {
        response: oneshot::Sender<BTreeMap<String, u8>>,
    },

    Status {
        response: oneshot::Sender<ConsoleStatus>,
    },
}

impl ConsoleMessage {
    /// Short name for trace output
    pub fn label(&self) -> &'static str {
        match self {
            ConsoleMessage::Inbound { .. } => "inbound",
            ConsoleMessage::ConnectionChanged { .. } => "connection_changed",
            ConsoleMessage::AttachTransport { .. } => "attach_transport",
            ConsoleMessage::Fade(_) => "fade",
            ConsoleMessage::Send { .. } => "send",
            ConsoleMessage::SetTickInterval(_) => "set_tick_interval",
            ConsoleMessage::SetMaxSysexLen(_) => "set_max_sysex_len",
            ConsoleMessage::SetFadeDefaults(_) => "set_fade_defaults",
            ConsoleMessage::StopAllFades => "stop_all_fades",
            ConsoleMessage::Shutdown => "shutdown",
            ConsoleMessage::GetValue { .. } => "get_value",
            ConsoleMessage::Snapshot { .. } => "snapshot",
            ConsoleMessage::Status { .. } => "status",
        }
    }
}
