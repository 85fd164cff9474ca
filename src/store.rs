//! Shared cell holding the most recent meter reading.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::record::TelemetryRecord;

/// Thread-safe holder of the single most recent [`TelemetryRecord`].
///
/// The listener is the sole writer; scrape and API handlers are readers.
/// The lock is scoped strictly to the replace or clone, so a slow
/// exposition render never stalls message ingestion and vice versa.
pub struct StateStore {
    current: Mutex<TelemetryRecord>,
}

impl StateStore {
    /// Create a store holding the zero-valued empty record.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(TelemetryRecord::default()),
        }
    }

    /// Swap in a newly decoded record wholesale.
    pub fn replace(&self, record: TelemetryRecord) {
        *self.current.lock() = record;
    }

    /// Clone out the current record.
    ///
    /// The caller works on its own copy with no lock held, so a reader
    /// always observes one complete record, never a mix of two.
    pub fn snapshot(&self) -> TelemetryRecord {
        self.current.lock().clone()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a shareable store handle.
pub type SharedStore = Arc<StateStore>;
