//! ==============================================================================
//! service.rs - readings service (validator + store + aggregation)
//! ==============================================================================
//!
//! purpose:
//!     the one place the pieces meet. write path: validate, then insert.
//!     read path: selection -> predicate -> store scan -> aggregation.
//!
//! relationships:
//!     - used by: api.rs (one call per request, on the blocking pool)
//!     - uses: validator.rs, filter.rs, aggregate.rs, store.rs
//!
//! all methods are blocking (store i/o) and hold no state of their own, so a
//! clone can be moved into any task.
//!
//! ==============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::aggregate;
use crate::domain::{DeviceSummary, Quartiles, Reading};
use crate::error::Result;
use crate::filter::Selection;
use crate::store::ReadingStore;
use crate::validator::{self, RawValue};

#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn ReadingStore>,
}

/// current time as epoch seconds
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

impl ReadingService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    // --------------------------------------------------------------------------
    // write path
    // --------------------------------------------------------------------------

    /// validate and persist one reading; a rejected reading never reaches the store
    pub fn record(
        &self,
        device_id: &str,
        reading_type: &str,
        value: &RawValue,
        created_at: Option<&RawValue>,
    ) -> Result<Reading> {
        let reading = match validator::admit(device_id, reading_type, value, created_at, now_epoch()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(device = device_id, error = %e, "rejected reading");
                return Err(e);
            }
        };
        self.store.insert(&reading)?;
        tracing::info!(
            device = %reading.device_id,
            kind = %reading.reading_type,
            value = reading.value,
            created_at = reading.created_at,
            "stored reading"
        );
        Ok(reading)
    }

    // --------------------------------------------------------------------------
    // read path
    // --------------------------------------------------------------------------

    pub fn readings(&self, selection: &Selection) -> Result<Vec<Reading>> {
        let readings = self.store.scan(&selection.predicate())?;
        tracing::debug!(selection = %selection.describe(), count = readings.len(), "scanned readings");
        Ok(readings)
    }

    pub fn devices(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.distinct_device_ids()?)
    }

    fn device_readings(&self, device_id: &str) -> Result<Vec<Reading>> {
        Ok(self.store.scan_by_device(device_id)?)
    }

    fn device_values(&self, device_id: &str) -> Result<Vec<i64>> {
        Ok(self.device_readings(device_id)?.iter().map(|r| r.value).collect())
    }

    pub fn max(&self, device_id: &str) -> Result<i64> {
        aggregate::compute_max(&self.device_values(device_id)?)
    }

    /// the reading carrying the device's maximum value
    pub fn max_reading(&self, device_id: &str) -> Result<Reading> {
        aggregate::max_reading(&self.device_readings(device_id)?)
    }

    pub fn mean(&self, device_id: &str) -> Result<f64> {
        aggregate::compute_mean(&self.device_values(device_id)?)
    }

    pub fn median_records(&self, device_id: &str) -> Result<Vec<Reading>> {
        aggregate::compute_median_records(&self.device_readings(device_id)?)
    }

    pub fn quartiles(&self, device_id: &str) -> Result<Quartiles> {
        aggregate::compute_quartiles(&self.device_values(device_id)?)
    }

    /// `EmptySet` when the device has no readings
    pub fn summarize_device(&self, device_id: &str) -> Result<DeviceSummary> {
        aggregate::summarize(device_id, &self.device_readings(device_id)?)
    }

    /// one summary per device known to the store, ordered by device id
    pub fn summary(&self) -> Result<Vec<DeviceSummary>> {
        let mut summaries = Vec::new();
        for device_id in self.devices()? {
            summaries.push(self.summarize_device(&device_id)?);
        }
        Ok(summaries)
    }
}
