// file: src/wal/writer.rs
// description: append-only JSON-lines WAL writer with configurable durability
// reference: internal durability discipline

use crate::error::{IndexError, Result};
use crate::wal::event::{EventKind, SyncMode, WAL_VERSION, WalEvent, WalScope};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct WriterInner {
    file: BufWriter<File>,
    seq: u64,
    last_fsync: Instant,
}

/// Appends one newline-terminated JSON record per event. Never rewrites or
/// deletes prior records; a crash mid-write leaves at most one incomplete
/// final line, which the reader tolerates. Physical appends are serialized by
/// an internal lock, so `emit` may be called concurrently from batch workers.
pub struct WalWriter {
    inner: Mutex<WriterInner>,
    scope: WalScope,
    run_id: String,
    sync_mode: SyncMode,
    fsync_interval: Duration,
}

impl WalWriter {
    pub fn open(
        path: &Path,
        scope: WalScope,
        run_id: String,
        sync_mode: SyncMode,
        fsync_interval: Duration,
        start_seq: u64,
    ) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Mutex::new(WriterInner {
                file: BufWriter::new(file),
                seq: start_seq,
                last_fsync: Instant::now(),
            }),
            scope,
            run_id,
            sync_mode,
            fsync_interval,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Appends one event and applies the configured durability mode. Returns
    /// the sequence number assigned to the record.
    pub fn emit(&self, kind: EventKind) -> Result<u64> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| IndexError::Wal("writer lock poisoned".to_string()))?;

        inner.seq += 1;
        let event = WalEvent {
            ts: chrono::Utc::now().to_rfc3339(),
            seq: inner.seq,
            run_id: self.run_id.clone(),
            collection: self.scope.collection.clone(),
            schema_hash: self.scope.schema_hash.clone(),
            db_path: self.scope.db_path.clone(),
            wal_version: WAL_VERSION,
            kind,
        };

        let line = serde_json::to_string(&event)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        inner.file.write_all(line.as_bytes())?;
        inner.file.write_all(b"\n")?;

        match self.sync_mode {
            SyncMode::None => {}
            SyncMode::Flush => {
                inner.file.flush()?;
            }
            SyncMode::Fsync => {
                inner.file.flush()?;
                if inner.last_fsync.elapsed() >= self.fsync_interval {
                    inner.file.get_ref().sync_data()?;
                    inner.last_fsync = Instant::now();
                }
            }
        }

        debug!(wal.seq = event.seq, wal.event = event.kind.name(), "wal append");
        Ok(event.seq)
    }

    /// Forces buffered records to stable storage. Called at run finalization
    /// so the terminal record is never lost to the fsync throttle.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| IndexError::Wal("writer lock poisoned".to_string()))?;
        inner.file.flush()?;
        inner.file.get_ref().sync_data()?;
        inner.last_fsync = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::reader::read_wal;
    use tempfile::TempDir;

    fn scope() -> WalScope {
        WalScope::new("chunks", "abcd", "data/lancedb")
    }

    fn open_writer(path: &Path) -> WalWriter {
        WalWriter::open(
            path,
            scope(),
            "run-1".to_string(),
            SyncMode::Flush,
            Duration::from_secs(1),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_appends_one_line_per_event() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wal");
        let writer = open_writer(&path);

        writer
            .emit(EventKind::RunStart {
                sync_mode: SyncMode::Flush,
            })
            .unwrap();
        writer.emit(EventKind::RunFinish { ok: true }).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_sequence_numbers_monotonic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wal");
        let writer = open_writer(&path);

        let first = writer
            .emit(EventKind::RunStart {
                sync_mode: SyncMode::Flush,
            })
            .unwrap();
        let second = writer.emit(EventKind::RunFinish { ok: true }).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_append_only_across_reopens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wal");

        {
            let writer = open_writer(&path);
            writer
                .emit(EventKind::RunStart {
                    sync_mode: SyncMode::Flush,
                })
                .unwrap();
        }
        {
            let writer = WalWriter::open(
                &path,
                scope(),
                "run-2".to_string(),
                SyncMode::Flush,
                Duration::from_secs(1),
                1,
            )
            .unwrap();
            writer
                .emit(EventKind::RunStart {
                    sync_mode: SyncMode::Flush,
                })
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let state = read_wal(&path, &scope()).unwrap().unwrap();
        assert_eq!(state.run_id, "run-2");
        assert_eq!(state.last_seq, 2);
    }

    #[test]
    fn test_fsync_mode_writes_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wal");
        let writer = WalWriter::open(
            &path,
            scope(),
            "run-1".to_string(),
            SyncMode::Fsync,
            Duration::from_millis(0),
            0,
        )
        .unwrap();

        writer
            .emit(EventKind::UpsertBatchCommitted {
                batch_size: 4,
                upsert_rows_committed_total: 4,
            })
            .unwrap();
        writer.sync().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("upsert_batch_committed"));
    }
}
