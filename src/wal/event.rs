// file: src/wal/event.rs
// description: write-ahead log event records and identity scoping
// reference: https://docs.rs/serde_json

use serde::{Deserialize, Serialize};

pub const WAL_VERSION: u32 = 1;

/// Durability applied after each appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Buffered only. Fastest, widest loss window.
    None,
    /// Flush to the OS buffer per record. Default.
    Flush,
    /// Flush plus fsync, throttled to an interval to bound fsync overhead.
    Fsync,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::None => "none",
            SyncMode::Flush => "flush",
            SyncMode::Fsync => "fsync",
        }
    }
}

/// Identity scope of a WAL stream. A single file may interleave events from
/// several scopes; a read folds only the events whose scope matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalScope {
    pub collection: String,
    pub schema_hash: String,
    pub db_path: String,
}

impl WalScope {
    pub fn new(
        collection: impl Into<String>,
        schema_hash: impl Into<String>,
        db_path: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            schema_hash: schema_hash.into(),
            db_path: db_path.into(),
        }
    }

    pub fn matches(&self, event: &WalEvent) -> bool {
        event.collection == self.collection
            && event.schema_hash == self.schema_hash
            && event.db_path == self.db_path
    }
}

/// Event payloads. `doc_done` is a historical alias of `doc_committed`; the
/// reader accepts both, the writer emits `doc_committed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    RunStart {
        sync_mode: SyncMode,
    },
    #[serde(alias = "doc_done")]
    DocCommitted {
        source_uri: String,
        doc_id: String,
        content_sha256: String,
        n_chunks: u64,
        updated_at: u64,
    },
    UpsertBatchCommitted {
        batch_size: u64,
        upsert_rows_committed_total: u64,
    },
    RunFinish {
        ok: bool,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RunStart { .. } => "run_start",
            EventKind::DocCommitted { .. } => "doc_committed",
            EventKind::UpsertBatchCommitted { .. } => "upsert_batch_committed",
            EventKind::RunFinish { .. } => "run_finish",
        }
    }
}

/// One newline-terminated JSON record. The envelope fields identify and scope
/// the event; `seq` is advisory and used only for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEvent {
    pub ts: String,
    pub seq: u64,
    pub run_id: String,
    pub collection: String,
    pub schema_hash: String,
    pub db_path: String,
    pub wal_version: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}
