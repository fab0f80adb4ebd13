//! ConsoleActor - single owner of all console state
//!
//! Holds the parameter store, the fade scheduler, one decoder and NRPN
//! assembler per console port, and the write side of every connection.
//! Everything reaches it as a [`ConsoleMessage`], so no state is shared
//! between tasks.
//!
//! The fade tick is an `Interval` that only exists while the scheduler has
//! work; an idle actor sleeps on its command channel alone.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::actor_handle::ConsoleHandle;
use super::commands::{ConsoleMessage, ConsoleStatus, FadeDefaults, FadeRequest, SourceStatus};
use super::connection::ConsoleSource;
use super::protocol::{
    mute_from_velocity, ufx_key_name, Assignment, ConsoleCommand, SysExReply, UfxScale,
    CC_UFX_KEY, CC_UFX_SCALE,
};
use super::transport::Transport;
use crate::fades::{Schedule, Transition, TransitionScheduler, DEFAULT_TICK_MS};
use crate::midi::{format_hex, MidiMessage, MidiStreamDecoder, DEFAULT_MAX_SYSEX_LEN, MIN_SYSEX_LEN};
use crate::state::nrpn::PARAM_DCA_ASSIGN;
use crate::state::{NrpnAssembler, ParameterPath, ParameterStore};

/// Controller used for scene bank select
const CC_BANK_SELECT: u8 = 0x00;

/// Startup parameters of the actor
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSettings {
    /// Zero-based MIDI channel of bus group 0
    pub base_channel: u8,
    pub tick_interval_ms: u64,
    pub max_sysex_len: usize,
    pub fade_defaults: FadeDefaults,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_channel: 0,
            tick_interval_ms: DEFAULT_TICK_MS,
            max_sysex_len: DEFAULT_MAX_SYSEX_LEN,
            fade_defaults: FadeDefaults::default(),
        }
    }
}

/// Per-port inbound state
struct SourceState {
    decoder: MidiStreamDecoder,
    nrpn: NrpnAssembler,
    bank: u8,
    connected: bool,
}

impl SourceState {
    fn new(base_channel: u8, max_sysex_len: usize) -> Self {
        Self {
            decoder: MidiStreamDecoder::with_max_sysex_len(max_sysex_len),
            nrpn: NrpnAssembler::new(base_channel),
            bank: 0,
            connected: false,
        }
    }

    /// Forget everything tied to the byte stream
    fn reset(&mut self) {
        self.decoder.reset();
        self.nrpn.reset();
        self.bank = 0;
    }
}

/// Actor responsible for all console I/O and parameter state
pub struct ConsoleActor {
    base_channel: u8,
    max_sysex_len: usize,
    fade_defaults: FadeDefaults,
    store: ParameterStore,
    scheduler: TransitionScheduler,
    sources: HashMap<ConsoleSource, SourceState>,
    /// Sorted by source, so the preferred port is tried first
    transports: Vec<(ConsoleSource, Arc<dyn Transport>)>,
    messages_out: u64,
    write_failures: u64,
    last_scene: Option<u16>,
    channel_names: BTreeMap<String, String>,
    preamp_gains: BTreeMap<u8, u8>,
    phantom: BTreeMap<u8, bool>,
    pad: BTreeMap<u8, bool>,
    dca_assignments: BTreeMap<u8, BTreeSet<u8>>,
    mute_group_assignments: BTreeMap<u8, BTreeSet<u8>>,
    ufx_key: Option<u8>,
    ufx_scale: Option<UfxScale>,
    command_rx: mpsc::UnboundedReceiver<ConsoleMessage>,
}

impl ConsoleActor {
    /// Spawn the actor on the current runtime and return its handle
    pub fn spawn(settings: ConsoleSettings) -> ConsoleHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = ConsoleActor::new(settings, cmd_rx);

        tokio::spawn(actor.run());
        info!("ConsoleActor spawned");

        ConsoleHandle::new(cmd_tx)
    }

    fn new(settings: ConsoleSettings, command_rx: mpsc::UnboundedReceiver<ConsoleMessage>) -> Self {
        Self {
            base_channel: settings.base_channel & 0x0F,
            max_sysex_len: settings.max_sysex_len.max(MIN_SYSEX_LEN),
            fade_defaults: settings.fade_defaults,
            store: ParameterStore::new(),
            scheduler: TransitionScheduler::new(settings.tick_interval_ms),
            sources: HashMap::new(),
            transports: Vec::new(),
            messages_out: 0,
            write_failures: 0,
            last_scene: None,
            channel_names: BTreeMap::new(),
            preamp_gains: BTreeMap::new(),
            phantom: BTreeMap::new(),
            pad: BTreeMap::new(),
            dca_assignments: BTreeMap::new(),
            mute_group_assignments: BTreeMap::new(),
            ufx_key: None,
            ufx_scale: None,
            command_rx,
        }
    }

    async fn run(mut self) {
        debug!("ConsoleActor run loop started");
        let mut ticker: Option<Interval> = None;

        loop {
            if self.scheduler.is_running() {
                // Steps are precomputed for the current interval, so a changed
                // interval retimes the running ticker too
                let period = Duration::from_millis(self.scheduler.tick_interval_ms());
                if ticker.as_ref().map(Interval::period) != Some(period) {
                    ticker = Some(fade_ticker(period));
                }
            } else {
                ticker = None;
            }

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ConsoleMessage::Shutdown) | None => break,
                        Some(cmd) => self.handle(cmd),
                    }
                }
                _ = next_tick(&mut ticker) => self.handle_tick(),
            }
        }

        let stopped = self.scheduler.stop_all();
        info!(stopped_fades = stopped, "ConsoleActor stopped");
    }

    fn handle(&mut self, cmd: ConsoleMessage) {
        trace!(command = cmd.label(), "Processing command");

        match cmd {
            ConsoleMessage::Inbound { source, data } => self.handle_inbound(source, &data),
            ConsoleMessage::ConnectionChanged { source, connected } => {
                self.handle_connection_changed(source, connected)
            }
            ConsoleMessage::AttachTransport { source, transport } => {
                self.transports.retain(|(s, _)| *s != source);
                self.transports.push((source, transport));
                self.transports.sort_by_key(|(s, _)| *s);
                debug!(%source, "Transport attached");
            }
            ConsoleMessage::Fade(request) => self.handle_fade(request),
            ConsoleMessage::Send { command, target } => self.handle_send(command, target),
            ConsoleMessage::SetTickInterval(ms) => {
                let applied = self.scheduler.set_tick_interval(ms);
                info!("Fade update rate set to {}ms", applied);
            }
            ConsoleMessage::SetMaxSysexLen(len) => {
                let len = len.max(MIN_SYSEX_LEN);
                for state in self.sources.values_mut() {
                    state.decoder.set_max_sysex_len(len);
                }
                self.max_sysex_len = len;
                info!("SysEx limit set to {} bytes", len);
            }
            ConsoleMessage::SetFadeDefaults(defaults) => {
                self.fade_defaults = defaults;
                debug!(easing = %defaults.easing, map_db = defaults.map_db, "Fade defaults updated");
            }
            ConsoleMessage::StopAllFades => {
                let stopped = self.scheduler.stop_all();
                info!("Stopped {} fade(s)", stopped);
            }
            ConsoleMessage::Shutdown => {}
            ConsoleMessage::GetValue { path, response } => {
                let _ = response.send(self.store.get(&path));
            }
            ConsoleMessage::Snapshot { response } => {
                let _ = response.send(self.store.snapshot());
            }
            ConsoleMessage::Status { response } => {
                let _ = response.send(self.status());
            }
        }
    }

    fn source_mut(&mut self, source: ConsoleSource) -> &mut SourceState {
        let (base, limit) = (self.base_channel, self.max_sysex_len);
        self.sources
            .entry(source)
            .or_insert_with(|| SourceState::new(base, limit))
    }

    fn handle_connection_changed(&mut self, source: ConsoleSource, connected: bool) {
        let state = self.source_mut(source);
        state.reset();
        state.connected = connected;

        if connected {
            info!(%source, "Console link up");
        } else {
            warn!(%source, "Console link down");
        }
    }

    fn handle_inbound(&mut self, source: ConsoleSource, data: &[u8]) {
        let state = self.source_mut(source);
        let messages = state.decoder.feed(data);

        for message in messages {
            debug!(%source, "<- {}", message);
            self.apply_inbound(source, message);
        }
    }

    /// Fold one console message into the store and status
    fn apply_inbound(&mut self, source: ConsoleSource, message: MidiMessage) {
        let base = self.base_channel;

        match message {
            MidiMessage::ControlChange { channel, cc, value } => {
                if channel == base {
                    match cc {
                        CC_BANK_SELECT => {
                            self.source_mut(source).bank = value;
                            return;
                        }
                        CC_UFX_KEY => {
                            self.ufx_key = Some(value);
                            return;
                        }
                        CC_UFX_SCALE => {
                            self.ufx_scale = Some(UfxScale::from_value(value));
                            return;
                        }
                        _ => {}
                    }
                }
                let Some(event) = self.source_mut(source).nrpn.handle_cc(channel, cc, value) else {
                    return;
                };
                match event.parameter() {
                    Some((path, value)) => {
                        self.store.set(path, value);
                    }
                    None if event.lsb == PARAM_DCA_ASSIGN => {
                        match Assignment::from_value(event.value) {
                            Some(assignment) => self.record_assignment(event.msb, assignment),
                            None => debug!(?event, "Unknown assignment value"),
                        }
                    }
                    None => debug!(?event, "Ignoring untracked NRPN parameter"),
                }
            }
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                let Some(bus_group) = self.source_mut(source).nrpn.bus_group(channel) else {
                    return;
                };
                if let Some(state) = mute_from_velocity(velocity) {
                    self.store.set(ParameterPath::mute(bus_group, note), state);
                }
            }
            MidiMessage::ProgramChange { channel, program } if channel == base => {
                let bank = self.source_mut(source).bank;
                let scene = u16::from(bank) * 128 + u16::from(program) + 1;
                info!(%source, scene, "Scene recalled");
                self.last_scene = Some(scene);
            }
            MidiMessage::PitchBend { channel, value } if channel == base => {
                let socket = (value & 0x7F) as u8;
                let gain = ((value >> 7) & 0x7F) as u8;
                self.preamp_gains.insert(socket, gain);
            }
            MidiMessage::SysEx { ref data } => match SysExReply::parse(data, base) {
                Some(SysExReply::SendLevel { path, value }) => {
                    self.store.set(path, value);
                }
                Some(SysExReply::ChannelName {
                    bus_group,
                    channel,
                    name,
                }) => {
                    debug!(bus_group, channel, %name, "Channel name reported");
                    self.channel_names
                        .insert(format!("{}/{}", bus_group, channel), name);
                }
                Some(SysExReply::Pad { socket, on }) => {
                    self.pad.insert(socket, on);
                }
                Some(SysExReply::Phantom { socket, on }) => {
                    self.phantom.insert(socket, on);
                }
                None => trace!("Unhandled SysEx {}", format_hex(data)),
            },
            other => trace!(%source, "Ignoring {}", other.kind()),
        }
    }

    fn record_assignment(&mut self, channel: u8, assignment: Assignment) {
        let (map, number, assigned) = match assignment {
            Assignment::Dca { dca, assigned } => (&mut self.dca_assignments, dca, assigned),
            Assignment::MuteGroup { group, assigned } => {
                (&mut self.mute_group_assignments, group, assigned)
            }
        };
        let set = map.entry(channel).or_default();
        if assigned {
            set.insert(number + 1);
        } else {
            set.remove(&(number + 1));
            if set.is_empty() {
                map.remove(&channel);
            }
        }
    }

    fn handle_fade(&mut self, request: FadeRequest) {
        let path = request.path;
        // Switches have no in-between values
        let duration_ms = if path.attribute.is_switch() {
            0.0
        } else {
            request.duration_ms
        };

        let transition = Transition {
            path,
            from: self.store.get(&path),
            to: request.to,
            duration_ms,
            easing: request.easing.unwrap_or(self.fade_defaults.easing),
            map_db: request.map_db.unwrap_or(self.fade_defaults.map_db),
        };

        match self.scheduler.run(&mut self.store, transition) {
            Schedule::Immediate(value) => {
                self.write(&ConsoleCommand::SetLevel { path, value }, None);
            }
            Schedule::Scheduled { steps } => {
                trace!(%path, steps, "Fade queued");
            }
        }
    }

    fn handle_send(&mut self, command: ConsoleCommand, target: Option<ConsoleSource>) {
        // The console does not echo our own writes, so state moves optimistically
        match command {
            ConsoleCommand::SetLevel { path, value } => {
                self.scheduler.cancel(&path);
                self.store.set(path, value);
            }
            ConsoleCommand::RecallScene { scene } => {
                self.last_scene = Some(scene.max(1));
            }
            ConsoleCommand::AssignDca { channel, .. }
            | ConsoleCommand::AssignMuteGroup { channel, .. } => {
                if let Some(assignment) = command.assignment() {
                    self.record_assignment(channel & 0x7F, assignment);
                }
            }
            ConsoleCommand::SetPhantom { socket, on } => {
                self.phantom.insert(socket & 0x7F, on);
            }
            ConsoleCommand::SetUfxKey { key } => self.ufx_key = Some(key.min(11)),
            ConsoleCommand::SetUfxScale { scale } => self.ufx_scale = Some(scale),
            _ => {}
        }
        self.write(&command, target);
    }

    fn handle_tick(&mut self) {
        for (path, value) in self.scheduler.tick() {
            self.write(&ConsoleCommand::SetLevel { path, value }, None);
        }
    }

    /// Encode and hand to a transport
    ///
    /// A pinned port (explicit or from the command itself) is the only one
    /// tried. Otherwise the first connected transport wins.
    fn write(&mut self, command: &ConsoleCommand, target: Option<ConsoleSource>) -> bool {
        let bytes = Bytes::from(command.encode(self.base_channel));
        if bytes.is_empty() {
            return false;
        }
        let target = target.or_else(|| command.target());

        for (source, transport) in &self.transports {
            if target.is_some_and(|t| t != *source) || !transport.is_connected() {
                continue;
            }
            match transport.send(bytes.clone()) {
                Ok(()) => {
                    debug!(
                        transport = transport.name(),
                        command = command.label(),
                        "-> {}",
                        format_hex(&bytes)
                    );
                    self.messages_out += 1;
                    return true;
                }
                Err(e) => warn!(transport = transport.name(), "Console write failed: {}", e),
            }
        }

        self.write_failures += 1;
        match target {
            Some(target) => warn!(
                %target,
                command = command.label(),
                "Console port not available, write dropped"
            ),
            None => warn!(
                command = command.label(),
                "No console connection available, write dropped"
            ),
        }
        false
    }

    fn status(&self) -> ConsoleStatus {
        let mut sources: Vec<SourceStatus> = self
            .sources
            .iter()
            .map(|(source, state)| {
                let stats = state.decoder.stats();
                SourceStatus {
                    source: *source,
                    connected: state.connected,
                    messages: stats.messages,
                    dropped_bytes: stats.dropped_bytes,
                    oversize_sysex: stats.oversize_sysex,
                }
            })
            .collect();
        sources.sort_by_key(|s| s.source);

        ConsoleStatus {
            sources,
            messages_out: self.messages_out,
            write_failures: self.write_failures,
            parameters: self.store.len(),
            active_fades: self.scheduler.active_jobs(),
            tick_interval_ms: self.scheduler.tick_interval_ms(),
            max_sysex_len: self.max_sysex_len,
            last_scene: self.last_scene,
            channel_names: self.channel_names.clone(),
            preamp_gains: self.preamp_gains.clone(),
            phantom: self.phantom.clone(),
            pad: self.pad.clone(),
            dca_assignments: self.dca_assignments.clone(),
            mute_group_assignments: self.mute_group_assignments.clone(),
            ufx_key: self.ufx_key.and_then(ufx_key_name).map(String::from),
            ufx_scale: self.ufx_scale,
        }
    }
}

/// Interval whose first tick is one period away
fn fade_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
