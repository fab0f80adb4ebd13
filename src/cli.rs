//! Command-line interface and REPL
//!
//! The editor runs on its own thread; each line is handed to the async side
//! and the prompt only comes back once the command has been executed, so
//! replies never interleave with the next prompt.

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::codec::db_to_fader_byte;
use crate::console::protocol::{
    ufx_key_from_name, UfxScale, DEFAULT_GO_NEXT_CC, DEFAULT_GO_PREVIOUS_CC, MAX_CUE,
    MUTE_GROUP_COUNT,
};
use crate::console::{ConsoleCommand, ConsoleHandle, ConsoleSource, FadeRequest};
use crate::easing::{Easing, EasingKind, EasingVariant};
use crate::midi::format_hex;
use crate::state::{ParameterPath, MAX_BUS_GROUP};

const DEFAULT_FADE_MS: f64 = 1000.0;

const HELP: &str = "\
Commands:
  fade <path> <value> [ms] [algorithm] [curve] [--linear]
  set <path> <value>          write a parameter now
  get <path>                  show the last known value
  dump                        all known parameters as JSON
  status                      connection and fade status
  scene <n>                   recall scene n (1-based)
  mute <group> <ch> on|off
  name <ch> <text>            rename an input channel
  getname <group> <ch>        ask the console for a channel name
  dca <ch> <dca> on|off       assign an input channel to a DCA (1-24)
  mutegroup <ch> <g> on|off   assign an input channel to a mute group (1-8)
  mutestatus <group> <ch>     ask the console for a mute state
  phantom <socket> on|off
  gain <socket> <0-127>
  ufx key <C..B>              UFX global key
  ufx scale major|minor       UFX global scale
  cue <n>                     recall surface cue n (0-1999)
  go [cc], back [cc]          surface Go/Next and Go/Previous
  raw <hex> [@mixrack|@surface]
                              send bytes as-is, e.g. raw B0 63 05
  stop                        stop all fades
  help, quit

Paths look like 0/12/faderLevel, 0/3/mute, 0/3/mainMixAssign or 2/1/sendLevel/1/4.
Values are 0-127, a level such as -10dB or -inf, or on/off.";

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Fade(FadeRequest),
    Set { path: ParameterPath, value: u8 },
    Get(ParameterPath),
    Dump,
    Status,
    Send(ConsoleCommand),
    /// Write through one port only
    SendTo(ConsoleCommand, ConsoleSource),
    Stop,
    Help,
    Quit,
}

/// Parse a REPL line; `Ok(None)` for blank input
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    let verb = words.remove(0).to_ascii_lowercase();

    let command = match verb.as_str() {
        "fade" => parse_fade(&words)?,
        "set" => {
            let [path, value] = expect_args::<2>(&words, "set <path> <value>")?;
            ReplCommand::Set {
                path: parse_path(path)?,
                value: parse_value(value)?,
            }
        }
        "get" => {
            let [path] = expect_args::<1>(&words, "get <path>")?;
            ReplCommand::Get(parse_path(path)?)
        }
        "dump" => ReplCommand::Dump,
        "status" => ReplCommand::Status,
        "scene" => {
            let [scene] = expect_args::<1>(&words, "scene <n>")?;
            let scene: u16 = scene
                .parse()
                .with_context(|| format!("invalid scene number '{}'", scene))?;
            if scene == 0 || scene > 128 * 128 {
                bail!("scene must be between 1 and {}", 128 * 128);
            }
            ReplCommand::Send(ConsoleCommand::RecallScene { scene })
        }
        "mute" => {
            let [group, channel, state] = expect_args::<3>(&words, "mute <group> <ch> on|off")?;
            let path = parse_path(&format!("{}/{}/mute", group, channel))?;
            let value = if parse_switch(state)? { 0x7F } else { 0x00 };
            ReplCommand::Set { path, value }
        }
        "name" => {
            if words.len() < 2 {
                bail!("usage: name <ch> <text>");
            }
            ReplCommand::Send(ConsoleCommand::SetChannelName {
                bus_group: 0,
                channel: parse_number(words[0], "channel")?,
                name: words[1..].join(" "),
            })
        }
        "getname" => {
            let [group, channel] = expect_args::<2>(&words, "getname <group> <ch>")?;
            let bus_group = parse_number(group, "group")?;
            if bus_group > MAX_BUS_GROUP {
                bail!("group must be 0-{}", MAX_BUS_GROUP);
            }
            ReplCommand::Send(ConsoleCommand::RequestChannelName {
                bus_group,
                channel: parse_number(channel, "channel")?,
            })
        }
        "dca" => {
            let [channel, dca, state] = expect_args::<3>(&words, "dca <ch> <dca> on|off")?;
            let dca: u8 = parse_number(dca, "dca")?;
            if !(1..=24).contains(&dca) {
                bail!("dca must be between 1 and 24");
            }
            ReplCommand::Send(ConsoleCommand::AssignDca {
                channel: parse_number(channel, "channel")?,
                dca: dca - 1,
                assign: parse_switch(state)?,
            })
        }
        "mutegroup" => {
            let [channel, group, state] = expect_args::<3>(&words, "mutegroup <ch> <g> on|off")?;
            let group: u8 = parse_number(group, "mute group")?;
            if !(1..=MUTE_GROUP_COUNT).contains(&group) {
                bail!("mute group must be between 1 and {}", MUTE_GROUP_COUNT);
            }
            ReplCommand::Send(ConsoleCommand::AssignMuteGroup {
                channel: parse_number(channel, "channel")?,
                group: group - 1,
                assign: parse_switch(state)?,
            })
        }
        "mutestatus" => {
            let [group, channel] = expect_args::<2>(&words, "mutestatus <group> <ch>")?;
            let bus_group = parse_number(group, "group")?;
            if bus_group > MAX_BUS_GROUP {
                bail!("group must be 0-{}", MAX_BUS_GROUP);
            }
            ReplCommand::Send(ConsoleCommand::RequestMuteStatus {
                bus_group,
                channel: parse_number(channel, "channel")?,
            })
        }
        "ufx" => {
            let [what, value] = expect_args::<2>(&words, "ufx key <C..B> | ufx scale major|minor")?;
            match what.to_ascii_lowercase().as_str() {
                "key" => ReplCommand::Send(ConsoleCommand::SetUfxKey {
                    key: ufx_key_from_name(value)
                        .with_context(|| format!("unknown key '{}'", value))?,
                }),
                "scale" => {
                    let scale = match value.to_ascii_lowercase().as_str() {
                        "major" => UfxScale::Major,
                        "minor" => UfxScale::Minor,
                        _ => bail!("scale must be major or minor"),
                    };
                    ReplCommand::Send(ConsoleCommand::SetUfxScale { scale })
                }
                _ => bail!("usage: ufx key <C..B> | ufx scale major|minor"),
            }
        }
        "cue" => {
            let [cue] = expect_args::<1>(&words, "cue <n>")?;
            let cue: u16 = cue
                .parse()
                .with_context(|| format!("invalid cue number '{}'", cue))?;
            if cue > MAX_CUE {
                bail!("cue must be between 0 and {}", MAX_CUE);
            }
            ReplCommand::Send(ConsoleCommand::RecallCue { cue })
        }
        "go" | "back" => {
            let cc = match words.as_slice() {
                [] if verb == "go" => DEFAULT_GO_NEXT_CC,
                [] => DEFAULT_GO_PREVIOUS_CC,
                [cc] => parse_number(cc, "controller")?,
                _ => bail!("usage: {} [cc]", verb),
            };
            if verb == "go" {
                ReplCommand::Send(ConsoleCommand::GoNext { cc })
            } else {
                ReplCommand::Send(ConsoleCommand::GoPrevious { cc })
            }
        }
        "phantom" => {
            let [socket, state] = expect_args::<2>(&words, "phantom <socket> on|off")?;
            ReplCommand::Send(ConsoleCommand::SetPhantom {
                socket: parse_number(socket, "socket")?,
                on: parse_switch(state)?,
            })
        }
        "gain" => {
            let [socket, gain] = expect_args::<2>(&words, "gain <socket> <0-127>")?;
            ReplCommand::Send(ConsoleCommand::SetPreampGain {
                socket: parse_number(socket, "socket")?,
                gain: parse_number(gain, "gain")?,
            })
        }
        "raw" => {
            let target = match words.last().copied().and_then(|w| w.strip_prefix('@')) {
                Some(port) => {
                    words.pop();
                    Some(parse_port(port)?)
                }
                None => None,
            };
            if words.is_empty() {
                bail!("usage: raw <hex> [@mixrack|@surface]");
            }
            let command = ConsoleCommand::Raw(hex::decode(words.concat()).context("invalid hex")?);
            match target {
                Some(target) => ReplCommand::SendTo(command, target),
                None => ReplCommand::Send(command),
            }
        }
        "stop" => ReplCommand::Stop,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };

    Ok(Some(command))
}

fn parse_fade(words: &[&str]) -> Result<ReplCommand> {
    let mut map_db = None;
    let positional: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| {
            if w.eq_ignore_ascii_case("--linear") {
                map_db = Some(false);
                false
            } else {
                true
            }
        })
        .collect();

    if positional.len() < 2 || positional.len() > 5 {
        bail!("usage: fade <path> <value> [ms] [algorithm] [curve] [--linear]");
    }

    let path = parse_path(positional[0])?;
    let to = parse_value(positional[1])?;
    let duration_ms = match positional.get(2) {
        Some(ms) => {
            let ms: f64 = ms
                .parse()
                .with_context(|| format!("invalid duration '{}'", ms))?;
            if !ms.is_finite() || ms < 0.0 {
                bail!("duration must be a positive number of milliseconds");
            }
            ms
        }
        None => DEFAULT_FADE_MS,
    };

    let mut request = FadeRequest::new(path, to, duration_ms);
    if let Some(algorithm) = positional.get(3) {
        let kind: EasingKind = algorithm.parse::<EasingKind>().map_err(anyhow::Error::msg)?;
        let variant: EasingVariant = match positional.get(4) {
            Some(curve) => curve.parse::<EasingVariant>().map_err(anyhow::Error::msg)?,
            None => EasingVariant::default(),
        };
        request = request.with_easing(Easing::new(kind, variant));
    }
    if let Some(map_db) = map_db {
        request = request.with_map_db(map_db);
    }

    Ok(ReplCommand::Fade(request))
}

fn expect_args<'a, const N: usize>(words: &[&'a str], usage: &str) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(words).map_err(|_| anyhow!("usage: {}", usage))
}

fn parse_path(s: &str) -> Result<ParameterPath> {
    s.parse::<ParameterPath>()
        .map_err(|e| anyhow!("invalid path '{}': {}", s, e))
}

fn parse_number(s: &str, what: &str) -> Result<u8> {
    let n: u8 = s
        .parse()
        .with_context(|| format!("invalid {} '{}'", what, s))?;
    if n > 0x7F {
        bail!("{} must be 0-127", what);
    }
    Ok(n)
}

fn parse_port(s: &str) -> Result<ConsoleSource> {
    match s.to_ascii_lowercase().as_str() {
        "mixrack" => Ok(ConsoleSource::MixRack),
        "surface" => Ok(ConsoleSource::Surface),
        _ => bail!("unknown port '{}', expected mixrack or surface", s),
    }
}

fn parse_switch(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => bail!("expected on or off, got '{}'", s),
    }
}

/// A wire value: 0-127, a level in dB, or on/off
fn parse_value(s: &str) -> Result<u8> {
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
        "on" => return Ok(0x7F),
        "off" | "-inf" | "-infdb" => return Ok(0x00),
        _ => {}
    }
    if let Some(db) = lower.strip_suffix("db") {
        let db: f64 = db
            .parse()
            .with_context(|| format!("invalid level '{}'", s))?;
        return Ok(db_to_fader_byte(db));
    }
    parse_number(s, "value")
}

/// Run a parsed command against the console; returns false to leave the REPL
pub async fn execute(console: &ConsoleHandle, command: ReplCommand) -> Result<bool> {
    match command {
        ReplCommand::Fade(request) => {
            println!(
                "Fading {} to {} over {} ms",
                request.path.to_string().cyan(),
                request.to,
                request.duration_ms
            );
            console.fade(request);
        }
        ReplCommand::Set { path, value } => {
            console.send(ConsoleCommand::SetLevel { path, value });
        }
        ReplCommand::Get(path) => match console.get_value(path).await {
            Some(value) => println!("{} = {}", path.to_string().cyan(), value.to_string().green()),
            None => println!("{} = {}", path.to_string().cyan(), "unknown".dimmed()),
        },
        ReplCommand::Dump => {
            let snapshot = console.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        ReplCommand::Status => {
            let status = console
                .status()
                .await
                .context("console actor is not running")?;
            for source in &status.sources {
                let state = if source.connected {
                    "connected".green()
                } else {
                    "disconnected".red()
                };
                println!(
                    "  {:<8} {}  in:{} dropped:{} oversize:{}",
                    source.source.as_str(),
                    state,
                    source.messages,
                    source.dropped_bytes,
                    source.oversize_sysex
                );
            }
            println!(
                "  out:{} failures:{} parameters:{} fades:{} tick:{}ms",
                status.messages_out,
                status.write_failures,
                status.parameters,
                status.active_fades,
                status.tick_interval_ms
            );
            if let Some(scene) = status.last_scene {
                println!("  last scene: {}", scene);
            }
            if let (Some(key), Some(scale)) = (&status.ufx_key, status.ufx_scale) {
                println!("  ufx: {} {:?}", key, scale);
            }
            for (path, name) in &status.channel_names {
                println!("  name {} = \"{}\"", path, name);
            }
            for (socket, gain) in &status.preamp_gains {
                let phantom = status.phantom.get(socket).copied().unwrap_or(false);
                let pad = status.pad.get(socket).copied().unwrap_or(false);
                println!("  socket {}: gain {} 48V {} pad {}", socket, gain, phantom, pad);
            }
            for (channel, dcas) in &status.dca_assignments {
                println!("  ch {} DCA {:?}", channel, dcas);
            }
            for (channel, groups) in &status.mute_group_assignments {
                println!("  ch {} mute groups {:?}", channel, groups);
            }
        }
        ReplCommand::Send(command) => {
            if let ConsoleCommand::Raw(ref bytes) = command {
                debug!("Raw send: {}", format_hex(bytes));
            }
            console.send(command);
        }
        ReplCommand::SendTo(command, target) => {
            debug!(%target, "Pinned send: {}", command.label());
            console.send_to(command, target);
        }
        ReplCommand::Stop => console.stop_all_fades(),
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => return Ok(false),
    }
    Ok(true)
}

type Line = (String, oneshot::Sender<()>);

/// Interactive prompt; returns when the user quits or input ends
pub async fn run_repl(console: ConsoleHandle) -> Result<()> {
    let (line_tx, mut line_rx) = mpsc::channel::<Line>(1);

    // A plain thread so a pending readline never holds up runtime shutdown
    std::thread::Builder::new()
        .name("repl".into())
        .spawn(move || {
            if let Err(e) = read_lines(line_tx) {
                eprintln!("{} {:#}", "REPL error:".red(), e);
            }
        })
        .context("Failed to start REPL thread")?;

    println!("Type {} for a list of commands", "help".bold());

    while let Some((line, done)) = line_rx.recv().await {
        let keep_going = match parse_command(&line) {
            Ok(Some(command)) => match execute(&console, command).await {
                Ok(keep_going) => keep_going,
                Err(e) => {
                    println!("{} {:#}", "error:".red(), e);
                    true
                }
            },
            Ok(None) => true,
            Err(e) => {
                println!("{} {:#}", "error:".red(), e);
                true
            }
        };
        if !keep_going {
            break;
        }
        let _ = done.send(());
    }

    Ok(())
}

fn read_lines(tx: mpsc::Sender<Line>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("dlive> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                let (done_tx, done_rx) = oneshot::channel();
                if tx.blocking_send((line, done_tx)).is_err() {
                    break;
                }
                if done_rx.blocking_recv().is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Attribute;

    fn parse(line: &str) -> ReplCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_fade_defaults() {
        let ReplCommand::Fade(request) = parse("fade 0/12/faderLevel 100") else {
            panic!("expected fade");
        };
        assert_eq!(request.path, ParameterPath::fader(0, 12));
        assert_eq!(request.to, 100);
        assert_eq!(request.duration_ms, DEFAULT_FADE_MS);
        assert_eq!(request.easing, None);
        assert_eq!(request.map_db, None);
    }

    #[test]
    fn test_fade_with_options() {
        let ReplCommand::Fade(request) = parse("FADE 2/1/sendLevel/1/4 -10dB 2500 cubic ease-out --linear")
        else {
            panic!("expected fade");
        };
        assert_eq!(
            request.path.attribute,
            Attribute::SendLevel {
                sub_bus: 1,
                sub_channel: 4
            }
        );
        assert_eq!(request.to, db_to_fader_byte(-10.0));
        assert_eq!(request.duration_ms, 2500.0);
        assert_eq!(
            request.easing,
            Some(Easing::new(EasingKind::Cubic, EasingVariant::Out))
        );
        assert_eq!(request.map_db, Some(false));
    }

    #[test]
    fn test_fade_rejects_bad_input() {
        assert!(parse_command("fade 0/1/faderLevel").is_err());
        assert!(parse_command("fade 0/1/faderLevel 128").is_err());
        assert!(parse_command("fade 0/1/faderLevel 10 -5").is_err());
        assert!(parse_command("fade 0/1/faderLevel 10 100 wobble").is_err());
        assert!(parse_command("fade nowhere 10").is_err());
    }

    #[test]
    fn test_values() {
        assert_eq!(parse_value("0").unwrap(), 0);
        assert_eq!(parse_value("127").unwrap(), 127);
        assert_eq!(parse_value("on").unwrap(), 127);
        assert_eq!(parse_value("-inf").unwrap(), 0);
        assert_eq!(parse_value("+10dB").unwrap(), 127);
        assert!(parse_value("loud").is_err());
    }

    #[test]
    fn test_mute_and_set() {
        assert_eq!(
            parse("mute 1 5 on"),
            ReplCommand::Set {
                path: ParameterPath::mute(1, 5),
                value: 0x7F
            }
        );
        assert_eq!(
            parse("set 0/3/mainMixAssign off"),
            ReplCommand::Set {
                path: ParameterPath::main_mix(0, 3),
                value: 0
            }
        );
        assert!(parse_command("mute 1 5 maybe").is_err());
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(
            parse("scene 130"),
            ReplCommand::Send(ConsoleCommand::RecallScene { scene: 130 })
        );
        assert!(parse_command("scene 0").is_err());

        assert_eq!(
            parse("name 4 Lead Vox"),
            ReplCommand::Send(ConsoleCommand::SetChannelName {
                bus_group: 0,
                channel: 4,
                name: "Lead Vox".into()
            })
        );
        assert_eq!(
            parse("dca 7 24 on"),
            ReplCommand::Send(ConsoleCommand::AssignDca {
                channel: 7,
                dca: 23,
                assign: true
            })
        );
        assert!(parse_command("dca 7 25 on").is_err());
        assert_eq!(
            parse("raw B0 63 05"),
            ReplCommand::Send(ConsoleCommand::Raw(vec![0xB0, 0x63, 0x05]))
        );
        assert!(parse_command("raw B0 6").is_err());
    }

    #[test]
    fn test_surface_and_ufx_commands() {
        assert_eq!(parse("cue 1999"), ReplCommand::Send(ConsoleCommand::RecallCue { cue: 1999 }));
        assert!(parse_command("cue 2000").is_err());
        assert_eq!(parse("go"), ReplCommand::Send(ConsoleCommand::GoNext { cc: 80 }));
        assert_eq!(parse("back 90"), ReplCommand::Send(ConsoleCommand::GoPrevious { cc: 90 }));
        assert!(parse_command("go 1 2").is_err());

        assert_eq!(parse("ufx key F#"), ReplCommand::Send(ConsoleCommand::SetUfxKey { key: 6 }));
        assert_eq!(
            parse("ufx scale Minor"),
            ReplCommand::Send(ConsoleCommand::SetUfxScale {
                scale: UfxScale::Minor
            })
        );
        assert!(parse_command("ufx key H").is_err());

        assert_eq!(
            parse("mutegroup 3 8 on"),
            ReplCommand::Send(ConsoleCommand::AssignMuteGroup {
                channel: 3,
                group: 7,
                assign: true
            })
        );
        assert!(parse_command("mutegroup 3 9 on").is_err());
        assert_eq!(
            parse("mutestatus 1 7"),
            ReplCommand::Send(ConsoleCommand::RequestMuteStatus {
                bus_group: 1,
                channel: 7
            })
        );
    }

    #[test]
    fn test_raw_with_port() {
        assert_eq!(
            parse("raw B0 50 7F @surface"),
            ReplCommand::SendTo(ConsoleCommand::Raw(vec![0xB0, 0x50, 0x7F]), ConsoleSource::Surface)
        );
        assert!(parse_command("raw @mixrack").is_err());
        assert!(parse_command("raw F8 @desk").is_err());
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(parse("dump"), ReplCommand::Dump);
        assert_eq!(parse("status"), ReplCommand::Status);
        assert_eq!(parse("stop"), ReplCommand::Stop);
        assert_eq!(parse("?"), ReplCommand::Help);
        assert_eq!(parse("exit"), ReplCommand::Quit);
        assert!(parse_command("launch rockets").is_err());
    }

    #[tokio::test]
    async fn test_execute_quit_and_stopped_console() {
        let (tx, rx) = mpsc::unbounded_channel();
        let console = ConsoleHandle::new(tx);
        drop(rx);

        assert!(!execute(&console, ReplCommand::Quit).await.unwrap());
        assert!(execute(&console, ReplCommand::Stop).await.unwrap());
        assert!(execute(&console, ReplCommand::Status).await.is_err());
    }
}
