//! Error types for the exporter runtime.

use thiserror::Error;

/// Fatal listener-side errors.
///
/// All of these end the process: the listener and the HTTP server are
/// co-terminal, so there is no mode where scrapes keep serving stale
/// data after ingestion has died.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to Zenoh: {0}")]
    Connect(String),

    #[error("Failed to subscribe to '{key_expr}': {reason}")]
    Subscribe { key_expr: String, reason: String },

    #[error("Failed to decode meter payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

/// Result type alias using the exporter's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
