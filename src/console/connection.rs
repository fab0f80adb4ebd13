//! TCP link to the console
//!
//! dLive exposes raw MIDI over TCP on two ports: the MixRack and the Surface.
//! Each connection task owns its socket, forwards every chunk it reads to the
//! console actor and writes whatever the actor queues. When the socket drops
//! the task retries with a growing delay, capped at the configured interval.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use super::actor_handle::ConsoleHandle;
use super::transport::Transport;
use crate::error::TransportError;

/// MIDI-over-TCP port of the MixRack
pub const MIXRACK_PORT: u16 = 51325;
/// MIDI-over-TCP port of the Surface
pub const SURFACE_PORT: u16 = 51328;

const READ_BUFFER_SIZE: usize = 4096;
const BACKOFF_STEP_MS: u64 = 250;

/// Which console port a stream belongs to
///
/// Ordered by write preference: commands go to the MixRack when it is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleSource {
    MixRack,
    Surface,
}

impl ConsoleSource {
    pub fn port(&self) -> u16 {
        match self {
            ConsoleSource::MixRack => MIXRACK_PORT,
            ConsoleSource::Surface => SURFACE_PORT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleSource::MixRack => "mixrack",
            ConsoleSource::Surface => "surface",
        }
    }
}

impl fmt::Display for ConsoleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write side of a console connection, handed to the actor as a [`Transport`]
pub struct ConnectionHandle {
    name: String,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl Transport for ConnectionHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected(self.name.clone()));
        }
        self.outbound
            .send(bytes)
            .map_err(|_| TransportError::Closed(self.name.clone()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Delay before reconnect attempt `attempt` (1-based)
pub fn reconnect_delay(attempt: u32, max: Duration) -> Duration {
    let step = Duration::from_millis(BACKOFF_STEP_MS.saturating_mul(u64::from(attempt.max(1))));
    step.min(max)
}

/// Start the connection task for `source` at `addr` (`host:port`)
///
/// The task ends once every [`ConnectionHandle`] clone is gone or the console
/// actor has shut down.
pub fn spawn_connection(
    source: ConsoleSource,
    addr: String,
    reconnect_interval: Duration,
    console: ConsoleHandle,
) -> (Arc<ConnectionHandle>, JoinHandle<()>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(false));

    let handle = Arc::new(ConnectionHandle {
        name: source.to_string(),
        connected: connected.clone(),
        outbound: outbound_tx,
    });

    let task = tokio::spawn(run_connection(
        source,
        addr,
        reconnect_interval,
        console,
        outbound_rx,
        connected,
    ));

    (handle, task)
}

enum Disconnect {
    /// The console closed the socket or it failed; try again
    Lost,
    /// Nobody is left to write to us
    Shutdown,
}

async fn run_connection(
    source: ConsoleSource,
    addr: String,
    reconnect_interval: Duration,
    console: ConsoleHandle,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    connected: Arc<AtomicBool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if console.is_closed() {
            break;
        }

        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                attempt = 0;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%source, "Failed to set TCP_NODELAY: {}", e);
                }
                info!(%source, %addr, "Console connected");

                connected.store(true, Ordering::Release);
                console.connection_changed(source, true);

                let outcome = pump(stream, source, &console, &mut outbound).await;

                connected.store(false, Ordering::Release);
                console.connection_changed(source, false);

                match outcome {
                    Ok(Disconnect::Shutdown) => break,
                    Ok(Disconnect::Lost) => warn!(%source, "Console closed the connection"),
                    Err(e) => warn!(%source, "Console connection lost: {:#}", e),
                }
            }
            Err(e) => {
                warn!(%source, %addr, "Console connection failed: {}", e);
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = reconnect_delay(attempt, reconnect_interval);
        debug!(
            "Console {} reconnect #{} in {}ms",
            source,
            attempt,
            delay.as_millis()
        );

        if !wait_before_retry(delay, &mut outbound).await {
            break;
        }
    }

    debug!(%source, "Console connection task stopped");
}

/// Shuttle bytes both ways until the socket or the outbound queue closes
async fn pump(
    stream: TcpStream,
    source: ConsoleSource,
    console: &ConsoleHandle,
    outbound: &mut mpsc::UnboundedReceiver<Bytes>,
) -> Result<Disconnect> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut buffer) => {
                let n = read.context("read from console failed")?;
                if n == 0 {
                    return Ok(Disconnect::Lost);
                }
                trace!(%source, bytes = n, "Console data");
                console.inbound(source, Bytes::copy_from_slice(&buffer[..n]));
            }
            queued = outbound.recv() => match queued {
                Some(bytes) => {
                    writer
                        .write_all(&bytes)
                        .await
                        .context("write to console failed")?;
                }
                None => return Ok(Disconnect::Shutdown),
            }
        }
    }
}

/// Sleep for `delay`, discarding writes queued before the link dropped;
/// returns false when the outbound queue closed
async fn wait_before_retry(delay: Duration, outbound: &mut mpsc::UnboundedReceiver<Bytes>) -> bool {
    let wait = sleep(delay);
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => return true,
            queued = outbound.recv() => {
                if queued.is_none() {
                    return false;
                }
                trace!("Dropping write queued while disconnected");
            }
        }
    }
}
