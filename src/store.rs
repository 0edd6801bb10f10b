//! ==============================================================================
//! store.rs - readings store abstraction
//! ==============================================================================
//!
//! purpose:
//!     the append-only log of readings, behind a trait so the service never
//!     knows which backend it talks to. two implementations:
//!     - MemoryStore: a vec behind a rwlock (tests, `backend = "memory"`)
//!     - SqliteStore: durable, see sqlite.rs
//!
//! contract:
//!     - insert is atomic per reading
//!     - scans return matches in insertion order
//!     - nothing is ever updated or deleted
//!
//! ==============================================================================

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::domain::{Reading, ReadingType};
use crate::error::StoreError;
use crate::filter::{DateRange, Predicate};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait ReadingStore: Send + Sync {
    fn insert(&self, reading: &Reading) -> StoreResult<()>;

    /// every reading matching `predicate`, oldest insert first
    fn scan(&self, predicate: &Predicate) -> StoreResult<Vec<Reading>>;

    fn distinct_device_ids(&self) -> StoreResult<BTreeSet<String>>;

    fn scan_by_device(&self, device_id: &str) -> StoreResult<Vec<Reading>> {
        self.scan(&Predicate::Device(device_id.to_string()))
    }

    fn scan_by_type(&self, reading_type: ReadingType) -> StoreResult<Vec<Reading>> {
        self.scan(&Predicate::Type(reading_type))
    }

    fn scan_by_date_range(&self, start: i64, end: i64) -> StoreResult<Vec<Reading>> {
        self.scan(&Predicate::CreatedBetween(DateRange::new(start, end)))
    }
}

// ==============================================================================
// in-memory implementation
// ==============================================================================

#[derive(Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            readings: RwLock::new(readings.into_iter().collect()),
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Pool("memory store lock poisoned".to_string())
}

impl ReadingStore for MemoryStore {
    fn insert(&self, reading: &Reading) -> StoreResult<()> {
        self.readings.write().map_err(poisoned)?.push(reading.clone());
        Ok(())
    }

    fn scan(&self, predicate: &Predicate) -> StoreResult<Vec<Reading>> {
        let readings = self.readings.read().map_err(poisoned)?;
        Ok(readings.iter().filter(|r| predicate.matches(r)).cloned().collect())
    }

    fn distinct_device_ids(&self) -> StoreResult<BTreeSet<String>> {
        let readings = self.readings.read().map_err(poisoned)?;
        Ok(readings.iter().map(|r| r.device_id.clone()).collect())
    }
}
