//! Configuration loading
//!
//! Bootstrap settings come from, in priority order:
//! 1. Command-line arguments (applied by the binary on top of this struct)
//! 2. Environment variables (likewise, via clap's `env`)
//! 3. TOML config file
//! 4. Compiled defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DROPBOARD_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface to bind
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub room: RoomConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Room registry settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RoomConfig {
    /// Name given to rooms created without one
    #[serde(default = "default_room_name")]
    pub default_name: String,

    /// Code generation attempts before giving up with CapacityExhausted
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

/// Image analysis collaborator
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Endpoint accepting raw image bytes; image uploads are refused when unset
    #[serde(default)]
    pub url: Option<String>,

    /// Time allowed for one analysis
    #[serde(default = "default_analyzer_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5780
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_room_name() -> String {
    "Poop Room".to_string()
}

fn default_code_attempts() -> u32 {
    64
}

fn default_analyzer_timeout_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dropboard"))
        .unwrap_or_else(|| PathBuf::from("./dropboard_data"))
        .join("dropboard.db")
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_name: default_room_name(),
            code_attempts: default_code_attempts(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_analyzer_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_host: default_bind_host(),
            database_path: default_database_path(),
            room: RoomConfig::default(),
            analyzer: AnalyzerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Locate and load the config file, falling back to defaults
    ///
    /// An explicitly named file (argument or environment) must exist; the
    /// per-user default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            info!("Loading config from ${} = {}", CONFIG_ENV_VAR, path);
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_file().filter(|p| p.exists()) {
            info!("Loading config from {}", path.display());
            return Self::from_file(&path);
        }

        debug!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Reject settings no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.room.code_attempts == 0 {
            return Err(Error::Config("room.code_attempts must be at least 1".to_string()));
        }
        if self.room.default_name.trim().is_empty() {
            return Err(Error::Config("room.default_name must not be empty".to_string()));
        }
        if self.analyzer.timeout_ms == 0 {
            return Err(Error::Config("analyzer.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// `<config_dir>/dropboard/config.toml`
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dropboard").join("config.toml"))
}
