//! Configuration management for SyncClip
//!
//! This module handles loading, validating, and generating the TOML
//! configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "SYNCCLIP_CONFIG";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML rendering error
    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),

    /// No platform config directory
    #[error("Could not find config directory")]
    NoConfigDir,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote store settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Local cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Remote store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API root; the clip endpoints live under `<base_url>/clips`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between polls
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Whether `watch` polls at all
    #[serde(default = "default_poll_enabled")]
    pub enabled: bool,
}

/// Local cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite cache database
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8788/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    crate::poller::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_poll_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("~/.local/share/syncclip/cache.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            enabled: default_poll_enabled(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            poll: PollConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from SYNCCLIP_CONFIG environment variable
    /// 2. ~/.config/syncclip/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::find_config_path() {
            Self::load_from_path(&path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            Ok(config)
        }
    }

    /// Load configuration with an optional explicit path
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from_path(&path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;
        config.expand_paths();
        config.validate_config()?;
        Ok(config)
    }

    /// Default location of the config file
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("syncclip").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_config_path().ok().filter(|p| p.exists())
    }

    fn expand_paths(&mut self) {
        self.cache.path = expand_path(&self.cache.path);
    }

    /// Validate configuration values
    fn validate_config(&self) -> Result<(), ConfigError> {
        let url = self.remote.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "remote.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }

        if !(1..=300).contains(&self.remote.request_timeout_secs) {
            return Err(ConfigError::Validation(
                "remote.request_timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        if !(1..=3600).contains(&self.poll.interval_secs) {
            return Err(ConfigError::Validation(
                "poll.interval_secs must be between 1 and 3600".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write the commented example to `path`, refusing to clobber unless `force`
    pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Generate example configuration file
    pub fn generate_example() -> String {
        let config = Config::default();

        format!(
            r#"# SyncClip Configuration File
# Location: ~/.config/syncclip/config.toml

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# Remote store
[remote]
# API root; clips are served from <base_url>/clips
base_url = "{}"
# Per-request timeout in seconds
request_timeout_secs = {}

# Background reconciliation
[poll]
# Seconds between polls of the remote store
interval_secs = {}
# Disable to only sync on explicit refresh
enabled = {}

# Offline cache
[cache]
# SQLite file holding the last known collection
path = "{}"
"#,
            config.log_level,
            config.remote.base_url,
            config.remote.request_timeout_secs,
            config.poll.interval_secs,
            config.poll.enabled,
            config.cache.path.display(),
        )
    }
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
