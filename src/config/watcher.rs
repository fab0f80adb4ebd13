//! Configuration file watcher for hot reload
//!
//! Invalid edits are logged and skipped; the previous configuration stays in
//! force until a file that validates is written.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Time given to editors to finish writing before the file is re-read
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields every valid new version
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
    path: String,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, AppConfig)> {
        let (tx, rx) = mpsc::channel(8);

        let initial = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        // notify calls back on its own thread, outside the runtime
        let runtime = tokio::runtime::Handle::current();
        let reload_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            debug!("Config file changed: {:?}", event.paths);

            let path = reload_path.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;
                match AppConfig::load(&path).await {
                    Ok(config) => {
                        if tx.send(config).await.is_err() {
                            debug!("Config watcher receiver dropped");
                        }
                    }
                    Err(e) => warn!("Ignoring invalid config change: {:#}", e),
                }
            });
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Watching {} for changes", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
                path: config_path,
            },
            initial,
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next valid config; `None` once the watcher is gone
    ///
    /// A single save often fires several events, so consecutive identical
    /// configs can be yielded; callers apply them idempotently.
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}
