//! Console traffic sniffer
//!
//! Connects straight to the console ports, bypassing the actor, and prints
//! every decoded message with its console meaning. Useful to check the base
//! channel setting and to see what the console reports while moving faders.

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::codec::fader_byte_to_db;
use crate::console::protocol::{
    mute_from_velocity, ufx_key_name, SysExReply, UfxScale, CC_UFX_KEY, CC_UFX_SCALE,
};
use crate::console::ConsoleSource;
use crate::midi::{format_hex, MidiMessage, MidiStreamDecoder};
use crate::state::{Attribute, NrpnAssembler, ParameterPath};

/// One decoded message and where it came from
#[derive(Debug, Clone)]
pub struct SnifferEvent {
    pub source: ConsoleSource,
    pub message: MidiMessage,
    pub meaning: Option<String>,
}

/// Stream decoder plus NRPN tracking for one port
struct SourceDecoder {
    decoder: MidiStreamDecoder,
    nrpn: NrpnAssembler,
    base_channel: u8,
}

impl SourceDecoder {
    fn new(base_channel: u8, max_sysex_len: usize) -> Self {
        Self {
            decoder: MidiStreamDecoder::with_max_sysex_len(max_sysex_len),
            nrpn: NrpnAssembler::new(base_channel),
            base_channel,
        }
    }

    fn feed(&mut self, source: ConsoleSource, data: &[u8]) -> Vec<SnifferEvent> {
        self.decoder
            .feed(data)
            .into_iter()
            .map(|message| {
                let meaning = self.describe(&message);
                SnifferEvent {
                    source,
                    message,
                    meaning,
                }
            })
            .collect()
    }

    /// Console meaning of a message, if it has one
    fn describe(&mut self, message: &MidiMessage) -> Option<String> {
        match *message {
            MidiMessage::ControlChange { channel, cc, value } if channel == self.base_channel => {
                match cc {
                    CC_UFX_KEY => Some(format!("ufx key {}", ufx_key_name(value)?)),
                    CC_UFX_SCALE => Some(match UfxScale::from_value(value) {
                        UfxScale::Major => "ufx scale major".to_string(),
                        UfxScale::Minor => "ufx scale minor".to_string(),
                    }),
                    _ => self.describe_nrpn(channel, cc, value),
                }
            }
            MidiMessage::ControlChange { channel, cc, value } => self.describe_nrpn(channel, cc, value),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                let bus_group = self.nrpn.bus_group(channel)?;
                let state = mute_from_velocity(velocity)?;
                Some(describe_value(&ParameterPath::mute(bus_group, note), state))
            }
            MidiMessage::ProgramChange { channel, program } if channel == self.base_channel => {
                Some(format!("scene program {}", program))
            }
            MidiMessage::SysEx { ref data } => match SysExReply::parse(data, self.base_channel)? {
                SysExReply::SendLevel { path, value } => Some(describe_value(&path, value)),
                SysExReply::ChannelName {
                    bus_group,
                    channel,
                    name,
                } => Some(format!("name {}/{} = \"{}\"", bus_group, channel, name)),
                SysExReply::Pad { socket, on } => Some(format!("pad {} = {}", socket, on_off(on))),
                SysExReply::Phantom { socket, on } => {
                    Some(format!("phantom {} = {}", socket, on_off(on)))
                }
            },
            _ => None,
        }
    }

    fn describe_nrpn(&mut self, channel: u8, cc: u8, value: u8) -> Option<String> {
        let event = self.nrpn.handle_cc(channel, cc, value)?;
        match event.parameter() {
            Some((path, value)) => Some(describe_value(&path, value)),
            None => Some(format!(
                "nrpn {}/{} param 0x{:02X} = {}",
                event.bus_group, event.msb, event.lsb, event.value
            )),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn describe_value(path: &ParameterPath, value: u8) -> String {
    match path.attribute {
        Attribute::FaderLevel | Attribute::SendLevel { .. } => {
            let db = fader_byte_to_db(value);
            if db.is_finite() {
                format!("{} = {} ({:+.1} dB)", path, value, db)
            } else {
                format!("{} = {} (-inf)", path, value)
            }
        }
        Attribute::Mute | Attribute::MainMixAssign => {
            format!("{} = {}", path, on_off(value >= 0x40))
        }
    }
}

/// Connect to the requested console ports and print traffic until Ctrl+C
pub async fn run_sniffer(
    host: &str,
    sources: &[ConsoleSource],
    base_channel: u8,
    max_sysex_len: usize,
) -> Result<()> {
    println!("{}", "=== dLive Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (event_tx, mut event_rx) = mpsc::channel::<SnifferEvent>(1000);

    for &source in sources {
        let addr = format!("{}:{}", host, source.port());
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Failed to connect to {} at {}", source, addr))?;
        info!("Sniffing {} at {}", source, addr);

        let tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = read_source(stream, source, base_channel, max_sysex_len, tx).await {
                warn!("{} stream ended: {:#}", source, e);
            }
        });
    }
    drop(event_tx);

    println!("{}", "Format: [time] PORT | HEX => MESSAGE :: MEANING".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

async fn read_source(
    mut stream: TcpStream,
    source: ConsoleSource,
    base_channel: u8,
    max_sysex_len: usize,
    tx: mpsc::Sender<SnifferEvent>,
) -> Result<()> {
    let mut decoder = SourceDecoder::new(base_channel, max_sysex_len);
    let mut buffer = vec![0u8; 4096];

    loop {
        let n = stream.read(&mut buffer).await.context("read failed")?;
        if n == 0 {
            anyhow::bail!("connection closed by console");
        }
        for event in decoder.feed(source, &buffer[..n]) {
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}

fn print_event(event: &SnifferEvent) {
    let time = Local::now().format("%H:%M:%S%.3f").to_string();
    let source = match event.source {
        ConsoleSource::MixRack => "MIXRACK".green(),
        ConsoleSource::Surface => "SURFACE".yellow(),
    };

    let hex = format_hex(&event.message.encode());
    let hex = match event.message {
        MidiMessage::NoteOn { .. } => hex.bright_green(),
        MidiMessage::NoteOff { .. } => hex.bright_red(),
        MidiMessage::ControlChange { .. } => hex.bright_yellow(),
        MidiMessage::PitchBend { .. } => hex.bright_cyan(),
        MidiMessage::SysEx { .. } => hex.bright_magenta(),
        _ => hex.normal(),
    };

    let meaning = event
        .meaning
        .as_ref()
        .map(|m| format!(" :: {}", m.bold()))
        .unwrap_or_default();

    println!(
        "[{}] {} | {} => {}{}",
        time.dimmed(),
        source,
        hex,
        event.message.to_string().bright_blue(),
        meaning
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nrpn_fader_is_described() {
        let mut decoder = SourceDecoder::new(0, 4096);
        let events = decoder.feed(
            ConsoleSource::MixRack,
            &[0xB1, 0x63, 4, 0x62, 0x17, 0x06, 127],
        );

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].meaning, None);
        assert_eq!(
            events[2].meaning.as_deref(),
            Some("1/4/faderLevel = 127 (+10.0 dB)")
        );
    }

    #[test]
    fn test_mute_pair_is_described_once() {
        let mut decoder = SourceDecoder::new(0, 4096);
        let events = decoder.feed(ConsoleSource::Surface, &[0x90, 2, 0x7F, 2, 0x00]);

        let meanings: Vec<Option<String>> = events.into_iter().map(|e| e.meaning).collect();
        assert_eq!(meanings, vec![Some("0/2/mute = on".to_string()), None]);
    }

    #[test]
    fn test_ufx_and_phantom_are_described() {
        let mut decoder = SourceDecoder::new(0, 4096);
        let mut data = vec![0xB0, 0x0C, 9, 0x0D, 1];
        data.extend_from_slice(&[
            0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x00, 0x0B, 4, 0x7F, 0xF7,
        ]);

        let meanings: Vec<Option<String>> = decoder
            .feed(ConsoleSource::MixRack, &data)
            .into_iter()
            .map(|e| e.meaning)
            .collect();
        assert_eq!(
            meanings,
            vec![
                Some("ufx key A".to_string()),
                Some("ufx scale minor".to_string()),
                Some("phantom 4 = on".to_string()),
            ]
        );
    }

    #[test]
    fn test_silent_level() {
        assert_eq!(
            describe_value(&ParameterPath::send(0, 1, 2, 3), 0),
            "0/1/sendLevel/2/3 = 0 (-inf)"
        );
    }
}
