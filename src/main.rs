//! dLive Bridge - command line entry point
//!
//! Connects to the MixRack and/or Surface MIDI ports of a dLive console and
//! exposes parameter writes, fades and scene recalls through an interactive
//! prompt.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dlive_bridge::cli;
use dlive_bridge::config::{AppConfig, ConfigWatcher};
use dlive_bridge::console::{spawn_connection, ConsoleActor, ConsoleHandle, ConsoleSource};
use dlive_bridge::sniffer;

/// dLive Bridge - drive an Allen & Heath dLive console over MIDI-over-TCP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print decoded console traffic instead of running the bridge
    #[arg(long)]
    sniff: bool,

    /// Run without the interactive prompt (stop with Ctrl+C)
    #[arg(long)]
    no_repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting dLive Bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if args.sniff {
        let config = AppConfig::load(&args.config).await?;
        let settings = config.console_settings();
        sniffer::run_sniffer(
            &config.console.host,
            &enabled_sources(&config),
            settings.base_channel,
            settings.max_sysex_len,
        )
        .await?;
        return Ok(());
    }

    // Load configuration with hot-reload watcher
    let (config_watcher, config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let console = ConsoleActor::spawn(config.console_settings());
    let mut links = Vec::new();
    for source in enabled_sources(&config) {
        let addr = format!("{}:{}", config.console.host, source.port());
        let (transport, task) =
            spawn_connection(source, addr, config.reconnect_interval(), console.clone());
        console.attach_transport(source, transport);
        links.push(task);
    }

    run_app(console.clone(), config, config_watcher, !args.no_repl).await?;

    console.shutdown();
    for task in links {
        task.abort();
    }

    info!("dLive Bridge shutdown complete");
    Ok(())
}

fn enabled_sources(config: &AppConfig) -> Vec<ConsoleSource> {
    let mut sources = Vec::new();
    if config.console.connect_mixrack {
        sources.push(ConsoleSource::MixRack);
    }
    if config.console.connect_surface {
        sources.push(ConsoleSource::Surface);
    }
    sources
}

async fn run_app(
    console: ConsoleHandle,
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    interactive: bool,
) -> Result<()> {
    info!("Starting main application loop...");

    let repl = async {
        if interactive {
            cli::run_repl(console.clone()).await
        } else {
            std::future::pending().await
        }
    };
    tokio::pin!(repl);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(new_config) = config_watcher.next_config() => {
                if new_config == config {
                    continue;
                }
                apply_config(&console, &config, &new_config);
                config = new_config;
            }
            result = &mut repl => {
                if let Err(e) = result {
                    error!("REPL failed: {:#}", e);
                }
                info!("REPL closed");
                break;
            }
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}

/// Push the hot-reloadable parts of a new config into the running actor
fn apply_config(console: &ConsoleHandle, old: &AppConfig, new: &AppConfig) {
    info!("Applying reloaded configuration");

    if new.fades.update_rate_ms != old.fades.update_rate_ms {
        console.set_tick_interval(new.fades.update_rate_ms);
    }
    if new.decoder.max_sysex_len != old.decoder.max_sysex_len {
        console.set_max_sysex_len(new.decoder.max_sysex_len);
    }
    if new.fade_defaults() != old.fade_defaults() {
        console.set_fade_defaults(new.fade_defaults());
    }
    if new.console != old.console {
        warn!("Console connection settings changed; restart to apply them");
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
