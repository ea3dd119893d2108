//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Base API origin (e.g. "https://api.folio.example"). The WebSocket
    /// endpoint is derived from this by scheme translation plus `/ws`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Emit toast events for incoming notifications/announcements
    #[serde(default = "default_show_toasts")]
    pub show_toasts: bool,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_show_toasts() -> bool {
    true
}

/// Reconnection policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Heartbeat and handshake timing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// How often to send a ping frame while connected (seconds)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,

    /// How long to wait for the server's auth acknowledgment (seconds)
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_auth_timeout() -> u64 {
    10
}

impl HeartbeatConfig {
    /// Ping interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Auth handshake deadline as a duration
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
            auth_timeout_secs: default_auth_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LiveConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: LiveConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = LiveConfig::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("folio").join("live.toml")),
            Some(PathBuf::from("./folio-live.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FOLIO_LIVE_API_URL") {
            self.api_url = url;
        }
        if let Ok(toasts) = std::env::var("FOLIO_LIVE_SHOW_TOASTS") {
            if let Ok(v) = toasts.parse() {
                self.show_toasts = v;
            }
        }
        if let Ok(attempts) = std::env::var("FOLIO_LIVE_MAX_ATTEMPTS") {
            if let Ok(v) = attempts.parse() {
                self.reconnect.max_attempts = v;
            }
        }
        if let Ok(interval) = std::env::var("FOLIO_LIVE_HEARTBEAT_SECS") {
            if let Ok(v) = interval.parse() {
                self.heartbeat.interval_secs = v;
            }
        }
        if let Ok(level) = std::env::var("FOLIO_LIVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FOLIO_LIVE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            show_toasts: default_show_toasts(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}
