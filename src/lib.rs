//! ==============================================================================
//! readings-hub - temperature/humidity readings store and aggregation engine
//! ==============================================================================
//!
//! architecture:
//!
//! ```text
//!     ┌───────────────────────────────────────────────────────────────┐
//!     │                      api.rs (axum, json)                       │
//!     └───────────────────────────────┬───────────────────────────────┘
//!                                     │ one call per request
//!     ┌───────────────────────────────┴───────────────────────────────┐
//!     │                   service.rs (ReadingService)                  │
//!     │   write: validator.rs ──► store      read: filter.rs ──► store │
//!     │                                            └──► aggregate.rs   │
//!     └───────────────────────────────┬───────────────────────────────┘
//!                                     │ ReadingStore trait
//!                    ┌────────────────┴────────────────┐
//!                    ▼                                 ▼
//!             ┌─────────────┐                   ┌─────────────┐
//!             │ MemoryStore │                   │ SqliteStore │
//!             └─────────────┘                   └─────────────┘
//! ```
//!
//! everything below api.rs is callable directly, no http round-trip needed.
//!
//! ==============================================================================

pub mod aggregate;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod telemetry;
pub mod validator;

pub use aggregate::{
    compute_max, compute_mean, compute_median, compute_median_records, compute_quartiles,
    max_reading, summarize,
};
pub use domain::{DeviceSummary, Quartiles, Reading, ReadingType};
pub use error::{ErrorKind, ReadingError, StoreError};
pub use filter::{DateRange, Predicate, Selection};
pub use service::ReadingService;
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, ReadingStore};
pub use validator::{validate_reading, validate_type, RawValue};
