//! Configuration for the Lixee exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Meter subscription settings.
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Listener behavior settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl ZenohConfig {
    /// Check that the configured mode is one Zenoh accepts.
    pub fn validate_mode(&self) -> Result<(), String> {
        match self.mode.as_str() {
            "client" | "peer" | "router" => Ok(()),
            other => Err(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            )),
        }
    }
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Meter subscription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Key expression the meter bridge publishes readings on.
    #[serde(default = "default_key_expr")]
    pub key_expr: String,
}

fn default_key_expr() -> String {
    "zigbee2mqtt/LiXee".to_string()
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            key_expr: default_key_expr(),
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9090").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "lixee").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "lixee".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

/// What to do when a meter payload fails to decode.
///
/// The default kills the exporter, on the grounds that a producer sending
/// garbage is a deployment fault worth surfacing loudly. `skip` keeps the
/// exporter alive on the last-known-good reading instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Treat a malformed payload as a fatal error (default).
    #[default]
    Fatal,
    /// Log the malformed payload and keep the previous state.
    Skip,
}

/// Listener behavior configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Decode failure policy: "fatal" or "skip".
    #[serde(default)]
    pub on_decode_error: DecodePolicy,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zenoh.validate_mode().map_err(ConfigError::Validation)?;

        if self.subscription.key_expr.is_empty() {
            return Err(ConfigError::Validation(
                "Subscription key expression must not be empty".to_string(),
            ));
        }

        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}
