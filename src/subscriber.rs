//! Zenoh listener feeding meter readings into the shared store.

use tokio::sync::watch;
use tracing::{debug, info, warn};
use zenoh::sample::SampleKind;

use crate::config::{DecodePolicy, ZenohConfig};
use crate::error::{Error, Result};
use crate::record::TelemetryRecord;
use crate::session;
use crate::store::SharedStore;

/// Subscribes to meter readings and replaces the stored state on each
/// successfully decoded payload.
///
/// The listener is the store's sole writer. Connect and subscribe
/// failures are fatal; decode failures follow the configured
/// [`DecodePolicy`].
pub struct TelemetryListener {
    store: SharedStore,
    zenoh_config: ZenohConfig,
    key_expr: String,
    on_decode_error: DecodePolicy,
}

impl TelemetryListener {
    /// Create a new listener writing into `store`.
    pub fn new(
        store: SharedStore,
        zenoh_config: ZenohConfig,
        key_expr: impl Into<String>,
        on_decode_error: DecodePolicy,
    ) -> Self {
        Self {
            store,
            zenoh_config,
            key_expr: key_expr.into(),
            on_decode_error,
        }
    }

    /// Decode one payload and update the store.
    ///
    /// A malformed payload never touches the store; under the `fatal`
    /// policy it is returned as an error, under `skip` it is logged and
    /// the previous state stands.
    pub fn handle_payload(&self, payload: &[u8]) -> Result<()> {
        match TelemetryRecord::decode(payload) {
            Ok(record) => {
                debug!(
                    meter_serial_number = %record.meter_serial_number,
                    apparent_power = record.apparent_power,
                    "Received meter reading"
                );
                self.store.replace(record);
                Ok(())
            }
            Err(e) => match self.on_decode_error {
                DecodePolicy::Fatal => Err(Error::Decode(e)),
                DecodePolicy::Skip => {
                    warn!(
                        error = %e,
                        payload_len = payload.len(),
                        "Skipping malformed meter payload"
                    );
                    Ok(())
                }
            },
        }
    }

    /// Run the listener until the shutdown signal is received or a fatal
    /// error occurs.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let session = session::connect(&self.zenoh_config).await?;

        info!(key_expr = %self.key_expr, "Subscribing to meter readings");
        let subscriber = session
            .declare_subscriber(&self.key_expr)
            .await
            .map_err(|e| Error::Subscribe {
                key_expr: self.key_expr.clone(),
                reason: e.to_string(),
            })?;

        info!("Listener started, waiting for meter readings...");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping listener");
                        break;
                    }
                }

                sample = subscriber.recv_async() => {
                    match sample {
                        Ok(sample) => {
                            if sample.kind() == SampleKind::Delete {
                                continue;
                            }

                            let payload = sample.payload().to_bytes();
                            self.handle_payload(&payload)?;
                        }
                        Err(e) => {
                            warn!("Subscriber channel closed: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        // Clean shutdown
        subscriber
            .undeclare()
            .await
            .map_err(|e| Error::Zenoh(format!("Failed to undeclare subscriber: {}", e)))?;
        session
            .close()
            .await
            .map_err(|e| Error::Zenoh(format!("Failed to close session: {}", e)))?;

        info!("Listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use std::sync::Arc;

    fn make_listener(policy: DecodePolicy) -> (SharedStore, TelemetryListener) {
        let store = Arc::new(StateStore::new());
        let listener = TelemetryListener::new(
            store.clone(),
            ZenohConfig::default(),
            "zigbee2mqtt/LiXee",
            policy,
        );
        (store, listener)
    }

    #[test]
    fn test_valid_payload_updates_store() {
        let (store, listener) = make_listener(DecodePolicy::Fatal);

        listener
            .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 100}"#)
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.meter_serial_number, "A");
        assert_eq!(snapshot.apparent_power, 100);
    }

    #[test]
    fn test_last_payload_wins() {
        let (store, listener) = make_listener(DecodePolicy::Fatal);

        listener
            .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 100}"#)
            .unwrap();
        listener
            .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 150}"#)
            .unwrap();

        assert_eq!(store.snapshot().apparent_power, 150);
    }

    #[test]
    fn test_malformed_payload_is_fatal_by_default() {
        let (store, listener) = make_listener(DecodePolicy::Fatal);

        let result = listener.handle_payload(b"not json");

        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(store.snapshot(), TelemetryRecord::default());
    }

    #[test]
    fn test_malformed_payload_skipped_under_skip_policy() {
        let (store, listener) = make_listener(DecodePolicy::Skip);

        listener
            .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 100}"#)
            .unwrap();
        listener.handle_payload(b"garbage").unwrap();

        // Last-known-good state stands.
        assert_eq!(store.snapshot().apparent_power, 100);
    }
}
