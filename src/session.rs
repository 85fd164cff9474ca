//! Zenoh session establishment.

use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Connect to Zenoh using the provided configuration.
///
/// Exactly one attempt is made; a failed connection is fatal to the
/// process. Reconnection policy belongs to whatever supervises the
/// exporter, not to the exporter itself.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    config.validate_mode().map_err(Error::Config)?;

    let mut zenoh_config = zenoh::Config::default();
    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    for (key, endpoints) in [
        ("connect/endpoints", &config.connect),
        ("listen/endpoints", &config.listen),
    ] {
        if endpoints.is_empty() {
            continue;
        }

        let endpoints_json = serde_json::to_string(endpoints)
            .map_err(|e| Error::Config(format!("Failed to serialize {}: {}", key, e)))?;
        zenoh_config
            .insert_json5(key, &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set {}: {}", key, e)))?;
    }

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_mode() {
        let config = ZenohConfig {
            mode: "broadcast".to_string(),
            ..Default::default()
        };

        let result = connect(&config).await;

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
