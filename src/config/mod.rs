//! Configuration management for Arranger Pad
//!
//! Application settings come from a YAML file; key bindings come from the
//! line-oriented keymap file, which can be hot-reloaded.

pub mod keymap_file;
pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::engine::{ModeTimeouts, QuadSettings};
use crate::profile::ProfileKind;

pub use keymap_file::{EngineVars, KeymapFile};
pub use watcher::KeymapWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub timers: TimerConfig,
    #[serde(default)]
    pub keymap: KeymapConfig,
    #[serde(default)]
    pub quad: QuadConfig,
}

/// Target arranger and pad hardware
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_profile")]
    pub profile: ProfileKind,
    /// MIDI channel 1-16; the profile's channel when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// USB connector on the left keeps key order; false mirrors it
    #[serde(default = "default_true")]
    pub usb_left: bool,
    /// Add the data dial mode to the encoder cycle (Ketron only)
    #[serde(default)]
    pub value_mode: bool,
}

/// MIDI output selection
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MidiConfig {
    /// Case-insensitive substring of the output port name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
}

/// Timing knobs, all in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimerConfig {
    #[serde(default = "default_mode_timeout")]
    pub tempo_timeout_ms: u64,
    #[serde(default = "default_mode_timeout")]
    pub volume_timeout_ms: u64,
    #[serde(default = "default_mode_timeout")]
    pub value_timeout_ms: u64,
    #[serde(default = "default_shift_hold")]
    pub shift_hold_ms: u64,
    #[serde(default = "default_key_flash")]
    pub key_flash_ms: u64,
    #[serde(default = "default_switch_window")]
    pub quad_switch_window_ms: u64,
    #[serde(default = "default_tune_hold")]
    pub tune_hold_ms: u64,
    #[serde(default = "default_recovery_pause")]
    pub recovery_pause_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

/// Keymap file location
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KeymapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub hot_reload: bool,
}

/// Quad encoder defaults; keymap `Enc*` variables override them
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_quad_step")]
    pub step: u8,
    #[serde(default = "default_true")]
    pub forward: bool,
    #[serde(default)]
    pub graduated: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            channel: None,
            usb_left: true,
            value_mode: false,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tempo_timeout_ms: default_mode_timeout(),
            volume_timeout_ms: default_mode_timeout(),
            value_timeout_ms: default_mode_timeout(),
            shift_hold_ms: default_shift_hold(),
            key_flash_ms: default_key_flash(),
            quad_switch_window_ms: default_switch_window(),
            tune_hold_ms: default_tune_hold(),
            recovery_pause_ms: default_recovery_pause(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for KeymapConfig {
    fn default() -> Self {
        Self {
            path: None,
            hot_reload: true,
        }
    }
}

impl Default for QuadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            step: default_quad_step(),
            forward: true,
            graduated: false,
        }
    }
}

impl MidiConfig {
    /// Port substring to open for a profile
    pub fn port_for(&self, profile: ProfileKind) -> &str {
        match &self.output_port {
            Some(port) => port,
            None => match profile {
                ProfileKind::Evm | ProfileKind::EvmPlus => "EVM",
                ProfileKind::Genos => "Genos",
            },
        }
    }
}

impl TimerConfig {
    pub fn mode_timeouts(&self) -> ModeTimeouts {
        ModeTimeouts {
            tempo: Duration::from_millis(self.tempo_timeout_ms),
            volume: Duration::from_millis(self.volume_timeout_ms),
            value: Duration::from_millis(self.value_timeout_ms),
        }
    }

    pub fn shift_hold(&self) -> Duration {
        Duration::from_millis(self.shift_hold_ms)
    }

    pub fn key_flash(&self) -> Duration {
        Duration::from_millis(self.key_flash_ms)
    }

    pub fn tune_hold(&self) -> Duration {
        Duration::from_millis(self.tune_hold_ms)
    }

    pub fn recovery_pause(&self) -> Duration {
        Duration::from_millis(self.recovery_pause_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl QuadConfig {
    pub fn settings(&self, timers: &TimerConfig) -> QuadSettings {
        QuadSettings {
            step: self.step,
            forward: self.forward,
            graduated: self.graduated,
            switch_window: Duration::from_millis(timers.quad_switch_window_ms),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise run on defaults
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not an empty mapping
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(channel) = self.device.channel {
            if channel == 0 || channel > 16 {
                anyhow::bail!("device.channel {} is invalid (must be 1-16)", channel);
            }
        }

        if let Some(port) = &self.midi.output_port {
            if port.trim().is_empty() {
                anyhow::bail!("midi.output_port cannot be empty");
            }
        }

        if !matches!(self.quad.step, 2 | 4 | 8) {
            anyhow::bail!("quad.step {} is invalid (must be 2, 4 or 8)", self.quad.step);
        }

        if self.timers.poll_interval_ms == 0 {
            anyhow::bail!("timers.poll_interval_ms must be greater than 0");
        }
        if self.timers.shift_hold_ms == 0 {
            anyhow::bail!("timers.shift_hold_ms must be greater than 0");
        }

        Ok(())
    }

    /// Output channel, 0-based
    pub fn channel(&self, profile_default: u8) -> u8 {
        self.device
            .channel
            .map(|c| c.saturating_sub(1))
            .unwrap_or(profile_default)
    }
}

// Default value functions
fn default_profile() -> ProfileKind { ProfileKind::EvmPlus }
fn default_true() -> bool { true }
fn default_mode_timeout() -> u64 { 60_000 }
fn default_shift_hold() -> u64 { 250 }
fn default_key_flash() -> u64 { 200 }
fn default_switch_window() -> u64 { 500 }
fn default_tune_hold() -> u64 { 2_000 }
fn default_recovery_pause() -> u64 { 250 }
fn default_poll_interval() -> u64 { 10 }
fn default_quad_step() -> u8 { 8 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.device.profile, ProfileKind::EvmPlus);
        assert_eq!(config.timers.shift_hold(), Duration::from_millis(250));
        assert_eq!(config.channel(15), 15);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
device:
  profile: genos
  channel: 1
  usb_left: false
midi:
  output_port: "Digital Workstation"
timers:
  tempo_timeout_ms: 5000
quad:
  step: 4
  graduated: true
"#;
        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.device.profile, ProfileKind::Genos);
        assert!(!config.device.usb_left);
        assert_eq!(config.channel(15), 0);
        assert_eq!(config.midi.port_for(ProfileKind::Genos), "Digital Workstation");
        assert_eq!(config.timers.mode_timeouts().tempo, Duration::from_secs(5));
        assert_eq!(config.timers.mode_timeouts().volume, Duration::from_secs(60));

        let quad = config.quad.settings(&config.timers);
        assert_eq!(quad.step, 4);
        assert!(quad.graduated);
        assert!(quad.forward);
        assert_eq!(quad.switch_window, Duration::from_millis(500));
    }

    #[test]
    fn test_default_port_per_profile() {
        let midi = MidiConfig::default();
        assert_eq!(midi.port_for(ProfileKind::EvmPlus), "EVM");
        assert_eq!(midi.port_for(ProfileKind::Genos), "Genos");
    }

    #[test]
    fn test_validation_errors() {
        assert!(AppConfig::parse("device:\n  channel: 17\n").is_err());
        assert!(AppConfig::parse("quad:\n  step: 3\n").is_err());
        assert!(AppConfig::parse("timers:\n  poll_interval_ms: 0\n").is_err());
        assert!(AppConfig::parse("midi:\n  output_port: \"  \"\n").is_err());
        assert!(AppConfig::parse("device:\n  profile: tyros\n").is_err());
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("missing.yaml"))
            .await
            .unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
