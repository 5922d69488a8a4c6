//! geotrace: telemetry ingest service plus TCP/HTTP echo and
//! request-logging demo servers.
//!
//! This crate re-exports the workspace crates so that integration tests and
//! benchmarks can import everything from one place.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──► tcp_echo
//!                 ├──► http_echo
//! geotrace CLI ───┼──► request_log
//!                 └──► telemetry ──► normalizer ──► TelemetryStore
//! ```

pub use geotrace_core::{config, normalizer, store, types};
pub use geotrace_core::{
    normalize, normalize_at, MemoryStore, Payload, PayloadValue, RecordId, RecordQuery, SortOrder,
    StoreError, StoreResult, StoredRecord, TelemetryRecord, TelemetryStore, ValidationError,
};
pub use geotrace_servers::{http_echo, request_log, shutdown_signal, tcp_echo, telemetry};
