//! Store doubles for exercising error paths without a real backend.

use async_trait::async_trait;
use geotrace_core::{
    RecordId, RecordQuery, StoreError, StoreResult, StoredRecord, TelemetryRecord, TelemetryStore,
};

/// A store whose every operation fails with an I/O error, standing in for an
/// unreachable database.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "document store unreachable",
    ))
}

#[async_trait]
impl TelemetryStore for FailingStore {
    async fn add(&self, _record: TelemetryRecord) -> StoreResult<RecordId> {
        Err(unavailable())
    }

    async fn query(&self, _query: RecordQuery) -> StoreResult<Vec<StoredRecord>> {
        Err(unavailable())
    }
}
