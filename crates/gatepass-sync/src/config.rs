//! # Station Configuration
//!
//! Configuration for one gatepass station (issuing desk or scanner).
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GATEPASS_DATABASE=/mnt/shared/registry.db                          │
//! │     GATEPASS_STATION_NAME="North Gate"                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or gatepass.toml in the platform config dir       │
//! │     ~/.config/gatepass/gatepass.toml (Linux)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     400×600 canvas, 2 s registry timeout, generated station id         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [station]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "North Gate"
//!
//! [registry]
//! database_path = "/mnt/shared/registry.db"
//! timeout_ms = 2000
//! poll_interval_ms = 1000
//! publish_retries = 5
//!
//! [render]
//! width = 400
//! height = 600
//! code_size = 160
//! concurrency = 4
//! font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
//! background_path = "event.jpg"
//!
//! [output]
//! dir = "out"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "gatepass.toml";

/// Smallest QR square: a generated token's symbol (37 modules with quiet
/// zone) at two pixels per module, rounded up.
pub const MIN_CODE_SIZE: u32 = 80;

// =============================================================================
// Station
// =============================================================================

/// Identity recorded with every redemption this station performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Unique station identifier (UUID v4 unless configured).
    pub id: String,

    /// Human-readable name (e.g., "North Gate").
    #[serde(default = "default_station_name")]
    pub name: String,
}

fn default_station_name() -> String {
    "Gate".to_string()
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            id: Uuid::new_v4().to_string(),
            name: default_station_name(),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Shared registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// SQLite file shared by all stations.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Upper bound on any single registry call (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Redeemed feed poll interval (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Retries for publishing a batch on retryable failures.
    #[serde(default = "default_publish_retries")]
    pub publish_retries: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("org", "gatepass", "gatepass")
        .map(|dirs| dirs.data_dir().join("registry.db"))
        .unwrap_or_else(|| PathBuf::from("registry.db"))
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_publish_retries() -> u32 {
    5
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            database_path: default_database_path(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            publish_retries: default_publish_retries(),
        }
    }
}

// =============================================================================
// Render
// =============================================================================

/// Ticket rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// QR square size in pixels.
    #[serde(default = "default_code_size")]
    pub code_size: u32,

    #[serde(default = "default_base_font_px")]
    pub base_font_px: f32,

    #[serde(default = "default_min_font_px")]
    pub min_font_px: f32,

    /// Renders in flight during a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Font for attendee names. Without one the bundled DejaVu Sans is used.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Default background image.
    #[serde(default)]
    pub background_path: Option<PathBuf>,
}

fn default_width() -> u32 {
    400
}
fn default_height() -> u32 {
    600
}
fn default_code_size() -> u32 {
    160
}
fn default_base_font_px() -> f32 {
    28.0
}
fn default_min_font_px() -> f32 {
    12.0
}
fn default_concurrency() -> usize {
    4
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            width: default_width(),
            height: default_height(),
            code_size: default_code_size(),
            base_font_px: default_base_font_px(),
            min_font_px: default_min_font_px(),
            concurrency: default_concurrency(),
            font_path: None,
            background_path: None,
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Where bundles are exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            dir: default_output_dir(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatepassConfig {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

impl GatepassConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else `gatepass.toml` in the config dir)
    /// 3. Environment variables
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        match config_path {
            Some(path) => {
                info!(?path, "Loading config from file");
                config = Self::from_toml(&std::fs::read_to_string(&path)?)?;
            }
            None => match Self::default_config_path() {
                Some(path) if path.exists() => {
                    info!(?path, "Loading config from file");
                    config = Self::from_toml(&std::fs::read_to_string(&path)?)?;
                }
                path => debug!(?path, "Config file not found, using defaults"),
            },
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections and keys take defaults.
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> SyncResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Saves configuration to `config_path`, or the default location.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }
        std::fs::write(&path, self.to_toml()?)
            .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.station.id.trim().is_empty() {
            return Err(SyncError::MissingStationId);
        }

        let invalid = |msg: &str| Err(SyncError::InvalidConfig(msg.to_string()));

        if self.registry.timeout_ms == 0 {
            return invalid("registry.timeout_ms must be greater than 0");
        }
        if self.registry.poll_interval_ms == 0 {
            return invalid("registry.poll_interval_ms must be greater than 0");
        }

        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            return invalid("render.width and render.height must be greater than 0");
        }
        if render.code_size < MIN_CODE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "render.code_size must be at least {MIN_CODE_SIZE}"
            )));
        }
        if render.code_size > render.width || render.code_size > render.height {
            return invalid("render.code_size must fit inside the canvas");
        }
        if render.concurrency == 0 {
            return invalid("render.concurrency must be greater than 0");
        }
        if !(render.min_font_px > 0.0 && render.min_font_px <= render.base_font_px) {
            return invalid("render.min_font_px must be positive and at most render.base_font_px");
        }

        Ok(())
    }

    /// Applies `GATEPASS_*` overrides. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("GATEPASS_DATABASE") {
            debug!(path = %path, "Overriding database path from environment");
            self.registry.database_path = PathBuf::from(path);
        }

        if let Some(id) = lookup("GATEPASS_STATION_ID") {
            debug!(station_id = %id, "Overriding station ID from environment");
            self.station.id = id;
        }

        if let Some(name) = lookup("GATEPASS_STATION_NAME") {
            self.station.name = name;
        }

        if let Some(timeout) = lookup("GATEPASS_REGISTRY_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.registry.timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid GATEPASS_REGISTRY_TIMEOUT_MS"),
            }
        }

        if let Some(concurrency) = lookup("GATEPASS_RENDER_CONCURRENCY") {
            match concurrency.parse::<usize>() {
                Ok(n) => self.render.concurrency = n,
                Err(_) => warn!(value = %concurrency, "Ignoring invalid GATEPASS_RENDER_CONCURRENCY"),
            }
        }

        if let Some(font) = lookup("GATEPASS_FONT") {
            self.render.font_path = Some(PathBuf::from(font));
        }

        if let Some(background) = lookup("GATEPASS_BACKGROUND") {
            self.render.background_path = Some(PathBuf::from(background));
        }

        if let Some(dir) = lookup("GATEPASS_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "gatepass", "gatepass")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Registry call bound.
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry.timeout_ms)
    }

    /// Redeemed feed poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.registry.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatepassConfig::default();
        assert!(!config.station.id.is_empty());
        assert_eq!(config.render.width, 400);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.code_size, 160);
        assert_eq!(config.render.concurrency, 4);
        assert_eq!(config.registry_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = GatepassConfig::from_toml(
            r#"
            [station]
            id = "gate-north"

            [render]
            concurrency = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.station.id, "gate-north");
        assert_eq!(config.station.name, "Gate");
        assert_eq!(config.render.concurrency, 8);
        assert_eq!(config.render.code_size, 160);
        assert_eq!(config.registry.publish_retries, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GATEPASS_DATABASE", "/mnt/shared/registry.db"),
            ("GATEPASS_STATION_NAME", "South Gate"),
            ("GATEPASS_REGISTRY_TIMEOUT_MS", "750"),
            ("GATEPASS_RENDER_CONCURRENCY", "not-a-number"),
            ("GATEPASS_FONT", "/fonts/Inter.ttf"),
        ]
        .into_iter()
        .collect();

        let mut config = GatepassConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.registry.database_path, PathBuf::from("/mnt/shared/registry.db"));
        assert_eq!(config.station.name, "South Gate");
        assert_eq!(config.registry.timeout_ms, 750);
        assert_eq!(config.render.concurrency, 4);
        assert_eq!(config.render.font_path, Some(PathBuf::from("/fonts/Inter.ttf")));
    }

    #[test]
    fn test_config_validation() {
        let mut config = GatepassConfig::default();

        config.station.id = "  ".into();
        assert!(matches!(config.validate(), Err(SyncError::MissingStationId)));
        config.station.id = "gate".into();

        config.render.concurrency = 0;
        assert!(config.validate().is_err());
        config.render.concurrency = 4;

        config.render.code_size = 500;
        assert!(config.validate().is_err());
        config.render.code_size = 30;
        assert!(config.validate().is_err());
        config.render.code_size = MIN_CODE_SIZE;
        assert!(config.validate().is_ok());
        config.render.code_size = 160;

        config.render.min_font_px = 40.0;
        assert!(config.validate().is_err());
        config.render.min_font_px = 12.0;

        config.registry.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = GatepassConfig::default();
        config.station.name = "West Gate".into();
        config.render.font_path = Some(PathBuf::from("/fonts/a.ttf"));
        config.save(Some(path.clone())).unwrap();

        let loaded = GatepassConfig::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = GatepassConfig::load(Some(PathBuf::from("/nonexistent/gatepass.toml"))).unwrap_err();
        assert!(err.is_config_error());
    }
}
