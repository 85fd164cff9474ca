//! Data model for Lixee meter readings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Firmware update status reported alongside a reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateStatus {
    pub installed_version: i64,
    pub latest_version: i64,
    pub state: String,
}

/// One decoded reading from the meter.
///
/// Field names mirror the zigbee2mqtt payload exactly so that the raw-state
/// endpoint re-serializes to the same JSON shape it was decoded from.
/// Missing keys take zero-value defaults; unrecognized keys are ignored.
///
/// `MOTDETAT` and `update_available` have no guaranteed shape on the wire,
/// so they are kept as opaque JSON values and never turned into metrics.
///
/// A record is immutable once decoded; [`StateStore`](crate::store::StateStore)
/// replaces the stored record wholesale instead of mutating fields in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryRecord {
    #[serde(rename = "MOTDETAT")]
    pub state_raw: Value,
    pub active_register_tier_delivered: String,
    pub apparent_power: i64,
    pub available_power: i64,
    pub current_summ_delivered: i64,
    pub current_tarif: String,
    pub linkquality: i64,
    pub meter_serial_number: String,
    pub mot_d_etat: String,
    pub rms_current: i64,
    pub rms_current_max: i64,
    pub update: UpdateStatus,
    pub update_available: Value,
    #[serde(rename = "warn_d_p_s")]
    pub warn_dps: i64,
}

impl TelemetryRecord {
    /// Decode a raw message payload into a record.
    pub fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}
