//! TOML-based configuration persistence for the KeyZone host.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\KeyZone\config.toml`
//! - Linux:    `~/.config/keyzone/config.toml`
//! - macOS:    `~/Library/Application Support/KeyZone/config.toml`
//!
//! # File layout (for beginners)
//!
//! ```toml
//! aliases = ["Left Pad", "Numpad"]
//!
//! [general]
//! toggle_key = 145          # ScrollLock
//! midi_channel = 1
//!
//! [midi]
//! output_device = "loopMIDI Port"
//! pitch_bend_range = 2
//! delay_enabled = false
//! delay_seconds = 1
//!
//! [[zones]]
//! name = "Drums"
//! target_alias = "Left Pad"
//! scale = "Major"
//! root_note = 36
//! input_key_codes = [81, 87, 69, 82]
//! ```
//!
//! Every field has a serde default, so a partial file (or an older file that
//! is missing newer fields) still loads.  Values are clamped into range when
//! they are turned into domain objects, never rejected.

use std::path::{Path, PathBuf};

use keyzone_core::{Zone, ZoneManager, DEFAULT_TOGGLE_KEY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::map_input::PointerCcMap;
use crate::application::settings::RuntimeSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    /// User alias names in UI order.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

/// General host behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Schema version string; bump on breaking changes.
    #[serde(default = "default_version")]
    pub version: String,
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Virtual-key code of the MIDI-mode hot-key.
    #[serde(default = "default_toggle_key")]
    pub toggle_key: u16,
    /// Output channel, 1–16.
    #[serde(default = "default_midi_channel")]
    pub midi_channel: u8,
}

/// MIDI output and delay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MidiConfig {
    /// Output reopened on start, matched by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    /// Semitones, 1–96.
    #[serde(default = "default_pitch_bend_range")]
    pub pitch_bend_range: u8,
    #[serde(default)]
    pub delay_enabled: bool,
    /// 1–10.
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u8,
}

/// Controller numbers driven by the pointer axes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PointerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_cc: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_cc: Option<u8>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_version() -> String {
    "1.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_toggle_key() -> u16 {
    DEFAULT_TOGGLE_KEY
}
fn default_midi_channel() -> u8 {
    1
}
fn default_pitch_bend_range() -> u8 {
    2
}
fn default_delay_seconds() -> u8 {
    1
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            toggle_key: default_toggle_key(),
            midi_channel: default_midi_channel(),
        }
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            pitch_bend_range: default_pitch_bend_range(),
            delay_enabled: false,
            delay_seconds: default_delay_seconds(),
        }
    }
}

// ── Domain conversion ─────────────────────────────────────────────────────────

impl AppConfig {
    /// Zones in file order, with every invariant re-established.
    pub fn zone_manager(&self) -> ZoneManager {
        ZoneManager::from_zones(self.zones.iter().cloned())
    }

    /// Runtime settings record (clamped by the settings store on publish).
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            version: 0,
            midi_channel: self.general.midi_channel,
            pitch_bend_range: self.midi.pitch_bend_range,
            delay_enabled: self.midi.delay_enabled,
            delay_seconds: self.midi.delay_seconds,
        }
    }

    pub fn pointer_cc_map(&self) -> PointerCcMap {
        PointerCcMap {
            x: self.pointer.x_cc,
            y: self.pointer.y_cc,
        }
    }

    /// Copies runtime settings back for saving.
    pub fn apply_runtime_settings(&mut self, settings: &RuntimeSettings) {
        self.general.midi_channel = settings.midi_channel;
        self.midi.pitch_bend_range = settings.pitch_bend_range;
        self.midi.delay_enabled = settings.delay_enabled;
        self.midi.delay_seconds = settings.delay_seconds;
    }

    /// Copies the zone list back for saving.
    pub fn apply_zones(&mut self, zones: &ZoneManager) {
        self.zones = zones.iter().map(|(_, zone)| zone.clone()).collect();
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `KeyZone` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("KeyZone"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyzone"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KeyZone")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keyzone_core::{LayoutStrategy, ScaleType};

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_midi_settings() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.midi.pitch_bend_range, 2);
        assert!(!cfg.midi.delay_enabled);
        assert_eq!(cfg.midi.delay_seconds, 1);
        assert_eq!(cfg.midi.output_device, None);
    }

    #[test]
    fn test_general_config_defaults() {
        let cfg = GeneralConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.toggle_key, 0x91);
        assert_eq!(cfg.midi_channel, 1);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_partial_midi_section_keeps_other_defaults() {
        let toml_str = r#"
[midi]
delay_enabled = true
"#;

        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        assert!(cfg.midi.delay_enabled);
        assert_eq!(cfg.midi.delay_seconds, 1);
        assert_eq!(cfg.general.midi_channel, 1);
    }

    #[test]
    fn test_zones_parse_and_normalize() {
        // Arrange
        let toml_str = r#"
aliases = ["Left Pad"]

[[zones]]
name = "Bass"
target_alias = "Left Pad"
scale = "Minor"
root_note = 200
layout = "Grid"
grid_interval = 5
input_key_codes = [65, 83, 65, 68]
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize zones");
        let zones = cfg.zone_manager();

        // Assert
        let (_, zone) = zones.iter().next().expect("one zone");
        assert_eq!(zone.name(), "Bass");
        assert_eq!(zone.scale(), ScaleType::Minor);
        assert_eq!(zone.layout(), LayoutStrategy::Grid);
        assert_eq!(zone.root_note(), 127);
        assert_eq!(zone.input_key_codes(), &[65, 83, 68]);
        assert!(!zone.target_alias_key().is_wildcard());
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_pointer_cc_omitted_when_unset() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(!toml_str.contains("x_cc"));
        assert!(!toml_str.contains("output_device"));
    }

    // ── Domain conversion ─────────────────────────────────────────────────────

    #[test]
    fn test_runtime_settings_round_trip_through_config() {
        let mut cfg = AppConfig::default();
        let settings = RuntimeSettings {
            version: 4,
            midi_channel: 3,
            pitch_bend_range: 12,
            delay_enabled: true,
            delay_seconds: 5,
        };

        cfg.apply_runtime_settings(&settings);
        let restored = cfg.runtime_settings();

        assert_eq!(restored, RuntimeSettings { version: 0, ..settings });
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().expect("tempdir");

        let cfg = load_config_from(&dir.path().join("absent.toml")).expect("load");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.aliases = vec!["Left Pad".to_string()];
        cfg.midi.output_device = Some("Synth".to_string());
        let mut zone = Zone::new("Lead");
        zone.set_target_alias("Left Pad");
        zone.set_keys([0x41, 0x53]);
        cfg.zones.push(zone);

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded.aliases, cfg.aliases);
        assert_eq!(loaded.midi.output_device.as_deref(), Some("Synth"));
        assert_eq!(loaded.zone_manager().len(), 1);
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "zones = 3").expect("write");

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
