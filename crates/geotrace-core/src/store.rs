//! Store: document-store interface for normalised [`TelemetryRecord`] values.
//!
//! The store is the only place records live once the normalizer hands them
//! over. Callers hold it as an `Arc<dyn TelemetryStore>` constructed once at
//! startup by [`open`] and injected into whatever layer needs it.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: process-local, lost on exit.
//! - [`JsonlStore`]: appends one JSON line per record and replays the file
//!   into a [`MemoryStore`] index when opened.

use crate::config::{StoreConfig, StoreKind};
use crate::types::TelemetryRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

// ---------------------------------------------------------------------------
// Ids, queries, results
// ---------------------------------------------------------------------------

/// Opaque identifier assigned to a record by [`TelemetryStore::add`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as returned by queries: its id plus the record itself,
/// serialised flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: TelemetryRecord,
}

/// Presentation order of a query's window on `serverReceivedAt`. The window
/// itself is always the `limit` most recent records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "desc")]
    NewestFirst,
    #[serde(rename = "asc")]
    OldestFirst,
}

/// Equality on `deviceId`: the `limit` most recent records by
/// `serverReceivedAt`, returned in `order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub device_id: String,
    pub order: SortOrder,
    pub limit: usize,
}

impl RecordQuery {
    /// The `limit` most recent records for `device_id`.
    pub fn newest(device_id: impl Into<String>, limit: usize) -> Self {
        Self {
            device_id: device_id.into(),
            order: SortOrder::NewestFirst,
            limit,
        }
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record on line {line} of {path}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistence for telemetry records.
///
/// Implementations decide ordering between records; queries must return
/// records ordered by `serverReceivedAt`, with ties broken by insertion order
/// (a later insert counts as newer).
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Persist a new record and return its id.
    async fn add(&self, record: TelemetryRecord) -> StoreResult<RecordId>;

    /// Records for one device, ordered and limited per `query`.
    async fn query(&self, query: RecordQuery) -> StoreResult<Vec<StoredRecord>>;

    /// The most recent record for `device_id`, if any.
    async fn last(&self, device_id: &str) -> StoreResult<Option<StoredRecord>> {
        let mut records = self.query(RecordQuery::newest(device_id, 1)).await?;
        Ok(records.pop())
    }
}

/// Build the store described by `config`.
pub async fn open(config: &StoreConfig) -> StoreResult<Arc<dyn TelemetryStore>> {
    match config.kind {
        StoreKind::Memory => {
            tracing::info!("using in-memory telemetry store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Jsonl => {
            let store = JsonlStore::open(&config.path).await?;
            tracing::info!(
                path = %store.path().display(),
                records = store.index.len().await,
                "opened JSON-lines telemetry store"
            );
            Ok(Arc::new(store))
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store. Cloning shares the same underlying records.
///
/// Each device's records are kept sorted by `serverReceivedAt` (ascending,
/// insertion order within equal timestamps) so queries are a slice walk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    devices: Arc<RwLock<HashMap<String, Vec<StoredRecord>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all devices.
    pub async fn len(&self) -> usize {
        self.devices.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn insert(&self, stored: StoredRecord) {
        let mut devices = self.devices.write().await;
        let records = devices.entry(stored.record.device_id.clone()).or_default();
        let ts = stored.record.server_received_at;
        let at = records.partition_point(|r| r.record.server_received_at <= ts);
        records.insert(at, stored);
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn add(&self, record: TelemetryRecord) -> StoreResult<RecordId> {
        let id = RecordId::generate();
        self.insert(StoredRecord {
            id: id.clone(),
            record,
        })
        .await;
        Ok(id)
    }

    async fn query(&self, query: RecordQuery) -> StoreResult<Vec<StoredRecord>> {
        let devices = self.devices.read().await;
        let Some(records) = devices.get(&query.device_id) else {
            return Ok(Vec::new());
        };
        let window = &records[records.len().saturating_sub(query.limit)..];
        let out = match query.order {
            SortOrder::NewestFirst => window.iter().rev().cloned().collect(),
            SortOrder::OldestFirst => window.to_vec(),
        };
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// JsonlStore
// ---------------------------------------------------------------------------

/// Append-only JSON-lines file with an in-memory index for queries.
///
/// Only whole lines are ever left in the file: a write that fails partway is
/// cut back off, and a torn last line found on open is dropped.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    appender: Mutex<Appender>,
    index: MemoryStore,
}

impl JsonlStore {
    /// Open (or create) the file at `path` and load every record in it.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let (complete, tail) = match contents.rfind('\n') {
            Some(end) => contents.split_at(end + 1),
            None => ("", contents.as_str()),
        };

        let index = MemoryStore::new();
        let mut lines = 0;
        for (n, line) in complete.lines().enumerate() {
            lines = n + 1;
            if line.trim().is_empty() {
                continue;
            }
            index.insert(parse_line(&path, n + 1, line)?).await;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut appender = Appender {
            file,
            committed: contents.len() as u64,
        };

        // A process killed mid-write leaves a last line without its newline.
        if !tail.trim().is_empty() {
            match parse_line(&path, lines + 1, tail) {
                Ok(stored) => {
                    index.insert(stored).await;
                    appender.append(b"\n").await?;
                }
                Err(e) => {
                    warn!(path = %path.display(), "dropping torn last line: {e}");
                    appender.file.set_len(complete.len() as u64).await?;
                    appender.committed = complete.len() as u64;
                }
            }
        }

        Ok(Self {
            path,
            appender: Mutex::new(appender),
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_line(path: &Path, line: usize, text: &str) -> StoreResult<StoredRecord> {
    serde_json::from_str(text).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        line,
        source,
    })
}

/// The store file plus the length of its last fully written line.
#[derive(Debug)]
struct Appender {
    file: tokio::fs::File,
    committed: u64,
}

impl Appender {
    /// Append `bytes` whole or not at all. Bytes past `committed` left by an
    /// earlier failure are discarded first.
    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let len = self.file.metadata().await?.len();
        if len > self.committed {
            warn!(
                committed = self.committed,
                found = len,
                "discarding partial write at end of store file"
            );
            self.file.set_len(self.committed).await?;
        }

        match write_flushed(&mut self.file, bytes).await {
            Ok(()) => {
                self.committed += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.file.set_len(self.committed).await {
                    warn!("could not cut back partial write: {rollback}");
                }
                Err(e)
            }
        }
    }
}

async fn write_flushed(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[async_trait]
impl TelemetryStore for JsonlStore {
    async fn add(&self, record: TelemetryRecord) -> StoreResult<RecordId> {
        let stored = StoredRecord {
            id: RecordId::generate(),
            record,
        };
        let mut line = serde_json::to_vec(&stored)?;
        line.push(b'\n');
        let id = stored.id.clone();

        // Indexed under the file lock so equal timestamps keep file order.
        let mut appender = self.appender.lock().await;
        appender.append(&line).await?;
        self.index.insert(stored).await;
        Ok(id)
    }

    async fn query(&self, query: RecordQuery) -> StoreResult<Vec<StoredRecord>> {
        self.index.query(query).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
