//! # Realtime Configuration
//!
//! Configuration for the realtime client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PERKSTREAM_URL=wss://rt.perkstream.app/ws                          │
//! │     PERKSTREAM_MAX_RECONNECT_ATTEMPTS=10                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/perkstream/realtime.toml (Linux)                         │
//! │     ~/Library/Application Support/app.perkstream.perkstream/...       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5s fixed reconnect, 5 attempts, 30s heartbeat, queue of 100        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # realtime.toml
//! [connection]
//! url = "wss://rt.perkstream.app/ws"
//! connect_timeout_secs = 10
//! auto_connect = true
//!
//! [reconnect]
//! enabled = true
//! interval_ms = 5000
//! max_attempts = 5
//! strategy = "fixed"  # fixed | exponential
//! max_interval_ms = 60000
//!
//! [heartbeat]
//! enabled = true
//! interval_ms = 30000
//!
//! [queue]
//! capacity = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use perkstream_core::DEFAULT_QUEUE_CAPACITY;

use crate::error::{RealtimeError, RealtimeResult};

// =============================================================================
// Reconnect Strategy
// =============================================================================

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    #[default]
    Fixed,

    /// Doubling delay with jitter, capped at `max_interval_ms`.
    Exponential,
}

impl std::fmt::Display for ReconnectStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconnectStrategy::Fixed => write!(f, "fixed"),
            ReconnectStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for ReconnectStrategy {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "constant" => Ok(ReconnectStrategy::Fixed),
            "exponential" | "backoff" => Ok(ReconnectStrategy::Exponential),
            other => Err(RealtimeError::InvalidConfig(format!(
                "Unknown reconnect strategy: '{}'. Valid options: fixed, exponential",
                other
            ))),
        }
    }
}

// =============================================================================
// Connection Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Realtime endpoint (ws:// or wss://).
    #[serde(default)]
    pub url: Option<String>,

    /// Timeout for the WebSocket handshake (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Connect as part of `initialize()`.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            url: None,
            connect_timeout_secs: default_connect_timeout(),
            auto_connect: true,
        }
    }
}

// =============================================================================
// Reconnect Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Reconnect after abnormal closes and failed opens.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay before each attempt (milliseconds). Initial delay for `exponential`.
    #[serde(default = "default_reconnect_interval")]
    pub interval_ms: u64,

    /// Attempts before giving up. 0 disables automatic reconnects.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: ReconnectStrategy,

    /// Upper bound on the delay (milliseconds), `exponential` only.
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
}

fn default_reconnect_interval() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_interval() -> u64 {
    60_000
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        ReconnectSettings {
            enabled: true,
            interval_ms: default_reconnect_interval(),
            max_attempts: default_max_attempts(),
            strategy: ReconnectStrategy::default(),
            max_interval_ms: default_max_interval(),
        }
    }
}

// =============================================================================
// Heartbeat Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between heartbeats while connected (milliseconds).
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        HeartbeatSettings {
            enabled: true,
            interval_ms: default_heartbeat_interval(),
        }
    }
}

// =============================================================================
// Queue Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Messages held while offline; the oldest is dropped beyond this.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            capacity: default_queue_capacity(),
        }
    }
}

// =============================================================================
// Main Realtime Configuration
// =============================================================================

/// Complete realtime client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    #[serde(default)]
    pub queue: QueueSettings,
}

impl RealtimeConfig {
    /// Creates a default config pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.connection.url = Some(url.into());
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (realtime.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> RealtimeResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading realtime config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| RealtimeError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load realtime config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> RealtimeResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| RealtimeError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RealtimeError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| RealtimeError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Realtime config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> RealtimeResult<()> {
        if let Some(ref url) = self.connection.url {
            validate_endpoint(url)?;
        }

        if self.connection.connect_timeout_secs == 0 {
            return Err(RealtimeError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.reconnect.interval_ms == 0 {
            return Err(RealtimeError::InvalidConfig(
                "reconnect.interval_ms must be greater than 0".into(),
            ));
        }

        if self.reconnect.strategy == ReconnectStrategy::Exponential
            && self.reconnect.max_interval_ms < self.reconnect.interval_ms
        {
            return Err(RealtimeError::InvalidConfig(
                "reconnect.max_interval_ms must not be below interval_ms".into(),
            ));
        }

        if self.heartbeat.interval_ms == 0 {
            return Err(RealtimeError::InvalidConfig(
                "heartbeat.interval_ms must be greater than 0".into(),
            ));
        }

        if self.queue.capacity == 0 {
            return Err(RealtimeError::InvalidConfig(
                "queue.capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PERKSTREAM_URL") {
            debug!(url = %url, "Overriding endpoint from environment");
            self.connection.url = Some(url);
        }

        if let Some(secs) = env_parse::<u64>("PERKSTREAM_CONNECT_TIMEOUT_SECS") {
            self.connection.connect_timeout_secs = secs;
        }

        if let Some(flag) = env_flag("PERKSTREAM_AUTO_CONNECT") {
            self.connection.auto_connect = flag;
        }

        if let Some(flag) = env_flag("PERKSTREAM_AUTO_RECONNECT") {
            debug!(enabled = flag, "Overriding auto-reconnect from environment");
            self.reconnect.enabled = flag;
        }

        if let Some(ms) = env_parse::<u64>("PERKSTREAM_RECONNECT_INTERVAL_MS") {
            self.reconnect.interval_ms = ms;
        }

        if let Some(max) = env_parse::<u32>("PERKSTREAM_MAX_RECONNECT_ATTEMPTS") {
            debug!(max_attempts = max, "Overriding max reconnect attempts from environment");
            self.reconnect.max_attempts = max;
        }

        if let Some(flag) = env_flag("PERKSTREAM_HEARTBEAT") {
            self.heartbeat.enabled = flag;
        }

        if let Some(ms) = env_parse::<u64>("PERKSTREAM_HEARTBEAT_INTERVAL_MS") {
            self.heartbeat.interval_ms = ms;
        }

        if let Some(capacity) = env_parse::<usize>("PERKSTREAM_QUEUE_CAPACITY") {
            self.queue.capacity = capacity;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "perkstream", "perkstream")
            .map(|dirs| dirs.config_dir().join("realtime.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn url(&self) -> Option<&str> {
        self.connection.url.as_deref()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.connect_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat.interval_ms)
    }
}

/// Checks that `url` parses and uses a WebSocket scheme.
pub fn validate_endpoint(url: &str) -> RealtimeResult<url::Url> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(RealtimeError::InvalidUrl(format!(
            "Endpoint must use ws:// or wss://, got {}://",
            other
        ))),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let flag = parse_flag(&raw);
    if flag.is_none() {
        warn!(var = name, value = %raw, "Ignoring unparsable environment flag");
    }
    flag
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.interval_ms, 5_000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.strategy, ReconnectStrategy::Fixed);
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.queue.capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RealtimeConfig::new("https://rt.perkstream.app/ws");
        assert!(matches!(config.validate(), Err(RealtimeError::InvalidUrl(_))));

        config.connection.url = Some("wss://rt.perkstream.app/ws".into());
        assert!(config.validate().is_ok());

        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        config.queue.capacity = 10;
        config.heartbeat.interval_ms = 0;
        assert!(config.validate().is_err());

        config.heartbeat.interval_ms = 1_000;
        config.reconnect.strategy = ReconnectStrategy::Exponential;
        config.reconnect.max_interval_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RealtimeConfig = toml::from_str(
            r#"
            [connection]
            url = "ws://localhost:9000/ws"

            [reconnect]
            max_attempts = 2
            strategy = "exponential"
            "#,
        )
        .unwrap();

        assert_eq!(config.url(), Some("ws://localhost:9000/ws"));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.strategy, ReconnectStrategy::Exponential);
        assert_eq!(config.reconnect.interval_ms, 5_000);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.connection.auto_connect);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RealtimeConfig::new("wss://rt.perkstream.app/ws");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[connection]"));
        assert!(toml_str.contains("[reconnect]"));
        assert!(toml_str.contains("strategy = \"fixed\""));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("fixed".parse::<ReconnectStrategy>().unwrap(), ReconnectStrategy::Fixed);
        assert_eq!(
            "Exponential".parse::<ReconnectStrategy>().unwrap(),
            ReconnectStrategy::Exponential
        );
        assert!("linear".parse::<ReconnectStrategy>().is_err());
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" OFF "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("perkstream-config-{}", uuid::Uuid::new_v4()))
            .join("realtime.toml");

        let mut config = RealtimeConfig::new("ws://127.0.0.1:9001/ws");
        config.queue.capacity = 7;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: RealtimeConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.queue.capacity, 7);
        assert_eq!(loaded.url(), Some("ws://127.0.0.1:9001/ws"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
