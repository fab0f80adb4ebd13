//! ConsoleHandle - public API of the console actor
//!
//! Cheap to clone. Fire-and-forget methods never wait; query methods await a
//! oneshot reply and return an empty answer if the actor has gone away.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use super::commands::{ConsoleMessage, ConsoleStatus, FadeDefaults, FadeRequest};
use super::connection::ConsoleSource;
use super::protocol::ConsoleCommand;
use super::transport::Transport;
use crate::state::ParameterPath;

/// Handle for interacting with the console actor
#[derive(Clone)]
pub struct ConsoleHandle {
    cmd_tx: mpsc::UnboundedSender<ConsoleMessage>,
}

impl ConsoleHandle {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<ConsoleMessage>) -> Self {
        Self { cmd_tx }
    }

    /// True once the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    fn post(&self, message: ConsoleMessage) {
        let _ = self.cmd_tx.send(message);
    }

    // =========================================================================
    // Fire and forget
    // =========================================================================

    pub fn inbound(&self, source: ConsoleSource, data: Bytes) {
        self.post(ConsoleMessage::Inbound { source, data });
    }

    pub fn connection_changed(&self, source: ConsoleSource, connected: bool) {
        self.post(ConsoleMessage::ConnectionChanged { source, connected });
    }

    pub fn attach_transport(&self, source: ConsoleSource, transport: Arc<dyn Transport>) {
        self.post(ConsoleMessage::AttachTransport { source, transport });
    }

    pub fn fade(&self, request: FadeRequest) {
        self.post(ConsoleMessage::Fade(request));
    }

    pub fn send(&self, command: ConsoleCommand) {
        self.post(ConsoleMessage::Send {
            command,
            target: None,
        });
    }

    /// Write through one port only; nothing is sent if it is down
    pub fn send_to(&self, command: ConsoleCommand, target: ConsoleSource) {
        self.post(ConsoleMessage::Send {
            command,
            target: Some(target),
        });
    }

    pub fn set_tick_interval(&self, ms: u64) {
        self.post(ConsoleMessage::SetTickInterval(ms));
    }

    pub fn set_max_sysex_len(&self, len: usize) {
        self.post(ConsoleMessage::SetMaxSysexLen(len));
    }

    pub fn set_fade_defaults(&self, defaults: FadeDefaults) {
        self.post(ConsoleMessage::SetFadeDefaults(defaults));
    }

    pub fn stop_all_fades(&self) {
        self.post(ConsoleMessage::StopAllFades);
    }

    pub fn shutdown(&self) {
        self.post(ConsoleMessage::Shutdown);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Last known value of a parameter
    pub async fn get_value(&self, path: ParameterPath) -> Option<u8> {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(ConsoleMessage::GetValue { path, response }).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Every known parameter, keyed by path string
    pub async fn snapshot(&self) -> BTreeMap<String, u8> {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(ConsoleMessage::Snapshot { response }).is_err() {
            return BTreeMap::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn status(&self) -> Option<ConsoleStatus> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx.send(ConsoleMessage::Status { response }).ok()?;
        rx.await.ok()
    }
}
