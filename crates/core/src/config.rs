//! Configuration management for the telemetry backend.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, and `TELEMETRY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::logging::LogFormat;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    /// Config file is not valid TOML or has the wrong shape
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// An environment override could not be parsed
    #[error("Invalid value for {key}: {value}")]
    Env {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Values parsed but violate a constraint
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP collaborator surface (health, CORS)
    pub http: HttpConfig,
    /// Subscriber WebSocket endpoint
    pub websocket: WebSocketConfig,
    /// Producer ingest listener
    pub ingest: IngestConfig,
    /// Fan-out hub tuning
    pub hub: HubConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address for the health endpoint
    pub bind_addr: SocketAddr,
    /// Origins permitted by the CORS layer and the WebSocket handshake
    pub allowed_origins: Vec<String>,
}

/// WebSocket listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Address for subscriber connections
    pub bind_addr: SocketAddr,
    /// Request path subscribers must use
    pub path: String,
    /// Readings queued per subscriber before delivery blocks
    pub outbox_capacity: usize,
}

/// Producer listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Address producers connect to
    pub bind_addr: SocketAddr,
    /// Upper bound on a single record, delimiter excluded
    pub max_record_bytes: usize,
}

/// Hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Bound on one delivery attempt to one subscriber
    pub delivery_timeout_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            path: "/ws/telemetry".to_string(),
            outbox_capacity: 64,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8765)),
            max_record_bytes: 64 * 1024,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: 1000,
        }
    }
}

impl HubConfig {
    /// Delivery timeout as a [`Duration`]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Config {
    /// Parse a TOML config file. Missing sections fall back to defaults.
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML config text.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from an optional file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            #[cfg(feature = "toml")]
            Some(path) => Self::from_file(path)?,
            #[cfg(not(feature = "toml"))]
            Some(_) => {
                return Err(ConfigError::Parse(
                    "built without TOML support".to_string(),
                ))
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TELEMETRY_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TELEMETRY_HTTP_ADDR") {
            self.http.bind_addr = parse_env("TELEMETRY_HTTP_ADDR", value)?;
        }
        if let Some(value) = lookup("TELEMETRY_WS_ADDR") {
            self.websocket.bind_addr = parse_env("TELEMETRY_WS_ADDR", value)?;
        }
        if let Some(value) = lookup("TELEMETRY_INGEST_ADDR") {
            self.ingest.bind_addr = parse_env("TELEMETRY_INGEST_ADDR", value)?;
        }
        if let Some(value) = lookup("TELEMETRY_DELIVERY_TIMEOUT_MS") {
            self.hub.delivery_timeout_ms = parse_env("TELEMETRY_DELIVERY_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("TELEMETRY_ALLOWED_ORIGINS") {
            self.http.allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("TELEMETRY_LOG_FORMAT") {
            self.logging.format = parse_env("TELEMETRY_LOG_FORMAT", value)?;
        }
        Ok(())
    }

    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.delivery_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "hub.delivery_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.websocket.outbox_capacity == 0 {
            return Err(ConfigError::Validation(
                "websocket.outbox_capacity must be greater than zero".to_string(),
            ));
        }
        if !self.websocket.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "websocket.path must start with '/': {:?}",
                self.websocket.path
            )));
        }
        if self.ingest.max_record_bytes == 0 {
            return Err(ConfigError::Validation(
                "ingest.max_record_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}
