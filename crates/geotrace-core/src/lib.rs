//! geotrace-core: payload types, record normalizer, document store and
//! configuration shared by every geotrace server.
//!
//! # Architecture
//!
//! ```text
//! request body ──► Payload ──► normalizer ──► TelemetryRecord ──► TelemetryStore
//!                                  │
//!                                  └──► ValidationError (no record)
//! ```
//!
//! The normalizer is synchronous and pure; the store is async and injected
//! by the caller as an `Arc<dyn TelemetryStore>`.

pub mod config;
pub mod normalizer;
pub mod store;
pub mod types;

pub use normalizer::{normalize, normalize_at, ValidationError};
pub use store::{
    MemoryStore, RecordId, RecordQuery, SortOrder, StoreError, StoreResult, StoredRecord,
    TelemetryStore,
};
pub use types::{Payload, PayloadValue, TelemetryRecord};
