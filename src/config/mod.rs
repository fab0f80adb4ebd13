//! Configuration management for the dLive bridge
//!
//! Handles loading, parsing, validation and hot-reloading of the YAML
//! configuration file.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::console::{ConsoleSettings, FadeDefaults};
use crate::easing::{Easing, EasingKind, EasingVariant};
use crate::fades::{MAX_TICK_MS, MIN_TICK_MS};
use crate::midi::{DEFAULT_MAX_SYSEX_LEN, MIN_SYSEX_LEN};

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub console: ConsoleConfig,
    #[serde(default)]
    pub fades: FadeConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

/// Console connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    pub host: String,
    #[serde(default = "default_true")]
    pub connect_mixrack: bool,
    #[serde(default)]
    pub connect_surface: bool,
    /// MIDI channel of bus group 0, 1-based as shown on the console
    #[serde(default = "default_base_channel")]
    pub base_midi_channel: u8,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

/// Fade engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FadeConfig {
    #[serde(default = "default_update_rate")]
    pub update_rate_ms: u64,
    #[serde(default)]
    pub default_algorithm: EasingKind,
    #[serde(default)]
    pub default_curve: EasingVariant,
    /// Interpolate in fader travel rather than raw values
    #[serde(default = "default_true")]
    pub map_db: bool,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            update_rate_ms: default_update_rate(),
            default_algorithm: EasingKind::default(),
            default_curve: EasingVariant::default(),
            map_db: true,
        }
    }
}

/// Stream decoder configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DecoderConfig {
    #[serde(default = "default_max_sysex_len")]
    pub max_sysex_len: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_sysex_len: default_max_sysex_len(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let host = self.console.host.trim();
        if host.is_empty() {
            anyhow::bail!("console.host cannot be empty");
        }
        if host.chars().any(char::is_whitespace) {
            anyhow::bail!("console.host '{}' contains whitespace", host);
        }
        if !self.console.connect_mixrack && !self.console.connect_surface {
            anyhow::bail!("Enable at least one of console.connect_mixrack or console.connect_surface");
        }
        if !(1..=12).contains(&self.console.base_midi_channel) {
            anyhow::bail!(
                "console.base_midi_channel {} is invalid (must be 1-12)",
                self.console.base_midi_channel
            );
        }
        if self.console.reconnect_interval_secs == 0 {
            anyhow::bail!("console.reconnect_interval_secs must be at least 1");
        }

        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.fades.update_rate_ms) {
            anyhow::bail!(
                "fades.update_rate_ms {} is invalid (must be {}-{})",
                self.fades.update_rate_ms,
                MIN_TICK_MS,
                MAX_TICK_MS
            );
        }

        if self.decoder.max_sysex_len < MIN_SYSEX_LEN {
            anyhow::bail!(
                "decoder.max_sysex_len {} is too small (minimum {})",
                self.decoder.max_sysex_len,
                MIN_SYSEX_LEN
            );
        }

        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.console.reconnect_interval_secs)
    }

    pub fn fade_defaults(&self) -> FadeDefaults {
        FadeDefaults {
            easing: Easing::new(self.fades.default_algorithm, self.fades.default_curve),
            map_db: self.fades.map_db,
        }
    }

    /// Startup parameters for the console actor
    pub fn console_settings(&self) -> ConsoleSettings {
        ConsoleSettings {
            base_channel: self.console.base_midi_channel.saturating_sub(1),
            tick_interval_ms: self.fades.update_rate_ms,
            max_sysex_len: self.decoder.max_sysex_len,
            fade_defaults: self.fade_defaults(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_base_channel() -> u8 { 1 }
fn default_reconnect_interval() -> u64 { 5 }
fn default_update_rate() -> u64 { 50 }
fn default_max_sysex_len() -> usize { DEFAULT_MAX_SYSEX_LEN }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> AppConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("console:\n  host: 10.0.1.131\n");

        assert!(config.validate().is_ok());
        assert!(config.console.connect_mixrack);
        assert!(!config.console.connect_surface);
        assert_eq!(config.console.base_midi_channel, 1);
        assert_eq!(config.fades.update_rate_ms, 50);
        assert_eq!(config.fades.default_algorithm, EasingKind::Linear);
        assert_eq!(config.fades.default_curve, EasingVariant::InOut);
        assert_eq!(config.decoder.max_sysex_len, 4096);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
console:
  host: 10.0.1.131
  connect_mixrack: false
  connect_surface: true
  base_midi_channel: 12
  reconnect_interval_secs: 2
fades:
  update_rate_ms: 20
  default_algorithm: cubic
  default_curve: ease-out
  map_db: false
decoder:
  max_sysex_len: 512
"#,
        );
        assert!(config.validate().is_ok());

        let settings = config.console_settings();
        assert_eq!(settings.base_channel, 11);
        assert_eq!(settings.tick_interval_ms, 20);
        assert_eq!(settings.max_sysex_len, 512);
        assert_eq!(
            settings.fade_defaults.easing,
            Easing::new(EasingKind::Cubic, EasingVariant::Out)
        );
        assert!(!settings.fade_defaults.map_db);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("console:\n  host: ''\n", "host"),
            ("console:\n  host: a b\n", "whitespace"),
            ("console:\n  host: x\n  base_midi_channel: 13\n", "base_midi_channel"),
            ("console:\n  host: x\n  base_midi_channel: 0\n", "base_midi_channel"),
            ("console:\n  host: x\n  reconnect_interval_secs: 0\n", "reconnect"),
            ("console:\n  host: x\n  connect_mixrack: false\n", "connect"),
            ("console:\n  host: x\nfades:\n  update_rate_ms: 5\n", "update_rate_ms"),
            ("console:\n  host: x\ndecoder:\n  max_sysex_len: 8\n", "max_sysex_len"),
        ];

        for (yaml, needle) in cases {
            let err = parse(yaml).validate().unwrap_err();
            assert!(err.to_string().contains(needle), "{yaml:?} -> {err}");
        }
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let result = serde_yaml::from_str::<AppConfig>(
            "console:\n  host: x\nfades:\n  default_algorithm: wobble\n",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "console:\n  host: 192.168.1.70\n")?;

        let config = AppConfig::load(&path.to_string_lossy()).await?;
        assert_eq!(config.console.host, "192.168.1.70");

        let missing = AppConfig::load(&temp_dir.path().join("nope.yaml").to_string_lossy()).await;
        assert!(missing.is_err());
        Ok(())
    }
}
