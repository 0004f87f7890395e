// file: src/wal/reader.rs
// description: WAL replay into resume state, tolerant of a truncated tail
// reference: internal recovery algorithm

use crate::error::Result;
use crate::wal::event::{EventKind, WalEvent, WalScope};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::{debug, warn};

/// A document known to be durably indexed, with the fingerprint and chunk
/// count recorded at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneDoc {
    pub doc_id: String,
    pub content_sha256: String,
    pub n_chunks: u64,
}

/// In-memory projection of one WAL scope. Never persisted; rebuilt from the
/// log at the start of every run.
#[derive(Debug, Clone)]
pub struct ResumeState {
    pub run_id: String,
    pub finished_ok: bool,
    pub last_event: Option<EventKind>,
    pub truncated_tail_ignored: bool,
    pub committed_batches: u64,
    pub upsert_rows_committed_total: u64,
    pub done_docs: HashMap<String, DoneDoc>,
    /// Highest envelope `seq` parsed from any scope, used to continue the
    /// sequence when appending to the same file.
    pub last_seq: u64,
}

/// Replays the WAL at `path`, folding only events whose identity scope
/// matches. Returns `None` when the file is missing or contains no
/// `run_start` for the scope.
///
/// Malformed or partial lines are never an error: reading stops at the first
/// unparseable line, everything before it stays authoritative, and the
/// condition is reported via `truncated_tail_ignored`. A fully-parsed
/// `run_finish{ok:true}` remains authoritative even when trailing garbage
/// follows it; garbage after a still-in-progress `run_start` leaves that run
/// unfinished.
pub fn read_wal(path: &Path, scope: &WalScope) -> Result<Option<ResumeState>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut run_id: Option<String> = None;
    let mut finished_ok = false;
    let mut last_event: Option<EventKind> = None;
    let mut truncated_tail_ignored = false;
    let mut committed_batches = 0u64;
    let mut upsert_rows_committed_total = 0u64;
    let mut done_docs: HashMap<String, DoneDoc> = HashMap::new();
    let mut last_seq = 0u64;

    let reader = BufReader::new(file);
    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                // Unreadable bytes mid-file are treated like a torn record.
                warn!("WAL line {} unreadable, stopping replay: {}", line_no + 1, err);
                truncated_tail_ignored = true;
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let event: WalEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                debug!(
                    "WAL line {} failed to parse ({}); ignoring tail",
                    line_no + 1,
                    err
                );
                truncated_tail_ignored = true;
                break;
            }
        };

        last_seq = last_seq.max(event.seq);

        if !scope.matches(&event) {
            continue;
        }

        match &event.kind {
            EventKind::RunStart { .. } => {
                run_id = Some(event.run_id.clone());
                finished_ok = false;
                committed_batches = 0;
                upsert_rows_committed_total = 0;
            }
            EventKind::DocCommitted {
                source_uri,
                doc_id,
                content_sha256,
                n_chunks,
                ..
            } => {
                done_docs.insert(
                    source_uri.clone(),
                    DoneDoc {
                        doc_id: doc_id.clone(),
                        content_sha256: content_sha256.clone(),
                        n_chunks: *n_chunks,
                    },
                );
            }
            EventKind::UpsertBatchCommitted {
                upsert_rows_committed_total: total,
                ..
            } => {
                committed_batches += 1;
                // The event carries a running total stamped by the writer;
                // taking the latest value instead of summing keeps replayed
                // batches from double-counting.
                upsert_rows_committed_total = *total;
            }
            EventKind::RunFinish { ok } => {
                finished_ok = *ok;
            }
        }

        last_event = Some(event.kind);
    }

    let Some(run_id) = run_id else {
        return Ok(None);
    };

    Ok(Some(ResumeState {
        run_id,
        finished_ok,
        last_event,
        truncated_tail_ignored,
        committed_batches,
        upsert_rows_committed_total,
        done_docs,
        last_seq,
    }))
}
