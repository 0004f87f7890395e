// file: src/pipeline/orchestrator.rs
// description: coordinates planning, embedding, upserts, and WAL checkpoints
// reference: orchestrates the resumable ingestion workflow

use crate::chunker::{ChunkPlanner, chunk_id, fingerprint, should_index_unit};
use crate::config::{ChunkingConfig, Config};
use crate::corpus::{FsUnitSource, Unit};
use crate::database::{ChunkUpserter, GroqEmbeddingClient, LanceDbClient};
use crate::error::Result;
use crate::pipeline::progress::{IndexStats, ProgressTracker};
use crate::utils::Validator;
use crate::wal::{DoneDoc, EventKind, WalScope, WalWriter, read_wal};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A unit that needs (re)indexing this run, with everything the indexing
/// phase needs to commit it.
#[derive(Debug, Clone)]
struct PendingDoc {
    unit: Unit,
    fingerprint: String,
    n_chunks: u64,
    prev_chunks: Option<u64>,
}

#[derive(Debug, Default)]
struct IndexPlan {
    planned: usize,
    satisfied: usize,
    pending: Vec<PendingDoc>,
}

/// Drives one index run: INIT (resume state + run_start), PLANNING
/// (fingerprint comparison against the WAL skip-set), INDEXING (embed +
/// idempotent upsert + WAL checkpoints), FINALIZE (run_finish).
///
/// The store client and embedding client are constructed once per process
/// and passed in; the orchestrator owns no lazily-initialized state.
pub struct IndexOrchestrator {
    config: Config,
    client: LanceDbClient,
    embedder: Arc<GroqEmbeddingClient>,
}

impl IndexOrchestrator {
    pub fn new(config: Config, client: LanceDbClient, embedder: Arc<GroqEmbeddingClient>) -> Self {
        Self {
            config,
            client,
            embedder,
        }
    }

    pub async fn run(&self, force: bool, limit: Option<usize>) -> Result<IndexStats> {
        info!("Starting index run");

        // Preconditions fail before any WAL write.
        Validator::validate_directory(&self.config.corpus.root_dir)?;
        self.client.ping().await?;

        let scope = WalScope::new(
            self.config.database.table_name.clone(),
            self.config.schema_hash(),
            self.config.database.uri.clone(),
        );

        let resume = read_wal(&self.config.wal.path, &scope)?;
        let (done_docs, start_seq) = match &resume {
            Some(state) => {
                info!(
                    "Resume state: run {} finished_ok={} done_docs={} committed_batches={}",
                    state.run_id,
                    state.finished_ok,
                    state.done_docs.len(),
                    state.committed_batches
                );
                if state.truncated_tail_ignored {
                    warn!("WAL had a truncated tail; resuming from last parseable record");
                }
                let done = if force {
                    info!("Force reindex requested; ignoring WAL skip-set");
                    HashMap::new()
                } else {
                    state.done_docs.clone()
                };
                (done, state.last_seq)
            }
            None => {
                info!("No resumable WAL state for this scope; full build");
                (HashMap::new(), 0)
            }
        };

        let run_id = Uuid::new_v4().to_string();
        let writer = Arc::new(WalWriter::open(
            &self.config.wal.path,
            scope,
            run_id,
            self.config.wal.sync_mode,
            Duration::from_millis(self.config.wal.fsync_interval_ms),
            start_seq,
        )?);

        writer.emit(EventKind::RunStart {
            sync_mode: self.config.wal.sync_mode,
        })?;

        let source = FsUnitSource::new(self.config.corpus.clone());
        let mut units = source.scan()?;
        if let Some(limit) = limit {
            units.truncate(limit);
        }

        let plan = plan_run(
            units,
            &done_docs,
            &self.config.chunking,
            self.config.corpus.include_media_stubs,
        );
        info!(
            "Planned {} documents: {} already satisfied, {} to index",
            plan.planned,
            plan.satisfied,
            plan.pending.len()
        );

        let progress = Arc::new(ProgressTracker::new(
            plan.planned,
            plan.satisfied,
            plan.pending.len(),
        ));
        let rows_total = Arc::new(AtomicU64::new(0));
        let workers = self.config.pipeline.parallel_workers.max(1);

        let results: Vec<Result<()>> = stream::iter(plan.pending.into_iter().map(|doc| {
            let client = self.client.clone();
            let embedder = Arc::clone(&self.embedder);
            let writer = Arc::clone(&writer);
            let progress = Arc::clone(&progress);
            let rows_total = Arc::clone(&rows_total);
            let chunking = self.config.chunking.clone();
            let embed_batch_size = self.config.pipeline.embed_batch_size;

            async move {
                let source_uri = doc.unit.source_uri.clone();
                progress.set_message(format!("Indexing {}", source_uri));

                let result = index_document(
                    &client,
                    embedder.as_ref(),
                    writer.as_ref(),
                    &chunking,
                    embed_batch_size,
                    doc,
                    rows_total.as_ref(),
                    progress.as_ref(),
                )
                .await;

                match &result {
                    Ok(()) => progress.inc_docs_indexed(),
                    Err(err) => {
                        progress.inc_docs_failed();
                        error!("Failed to index {}: {}", source_uri, err);
                    }
                }
                result
            }
        }))
        .buffer_unordered(workers)
        .collect()
        .await;

        let stats = progress.get_stats();
        progress.finish();

        let first_err = results.into_iter().find_map(|result| result.err());
        if let Some(err) = first_err {
            // Graceful abort: the next run's resume logic must see this run
            // as incomplete. Best effort only, the original error wins.
            if writer.emit(EventKind::RunFinish { ok: false }).is_err() {
                warn!("Could not record run_finish after failure");
            }
            let _ = writer.sync();
            return Err(err);
        }

        writer.emit(EventKind::RunFinish { ok: true })?;
        writer.sync()?;

        self.log_final_stats(&stats);
        Ok(stats)
    }

    fn log_final_stats(&self, stats: &IndexStats) {
        info!("=== Index Run Summary ===");
        info!("Duration: {} seconds", stats.duration_secs);
        info!("Documents planned: {}", stats.docs_planned);
        info!("Documents satisfied (skipped): {}", stats.docs_satisfied);
        info!("Documents indexed: {}", stats.docs_indexed);
        info!("Documents failed: {}", stats.docs_failed);
        info!("Chunks upserted: {}", stats.chunks_upserted);
        info!("Batches committed: {}", stats.batches_committed);
        info!("Orphan chunks deleted: {}", stats.orphan_chunks_deleted);
        info!("Success rate: {:.2}%", stats.success_rate());
        info!("Indexing speed: {:.2} docs/sec", stats.docs_per_second());
        info!("=========================");
    }
}

/// PLANNING phase: decide per unit whether resume state already satisfies it.
/// Pure over its inputs, so resume decisions are unit-testable without a
/// store.
fn plan_run(
    units: Vec<Unit>,
    done_docs: &HashMap<String, DoneDoc>,
    chunking: &ChunkingConfig,
    include_media_stubs: bool,
) -> IndexPlan {
    let planner = ChunkPlanner::new(chunking.clone());
    let mut plan = IndexPlan::default();

    for unit in units {
        if !should_index_unit(&unit, include_media_stubs) {
            debug!("Skipping non-indexable unit: {}", unit.source_uri);
            continue;
        }

        plan.planned += 1;
        let digest = fingerprint(&unit, chunking);
        let n_chunks = planner.plan_count(&unit);

        match done_docs.get(&unit.source_uri) {
            Some(done) if done.content_sha256 == digest && done.n_chunks == n_chunks => {
                debug!("Already satisfied: {}", unit.source_uri);
                plan.satisfied += 1;
            }
            Some(done) => {
                plan.pending.push(PendingDoc {
                    unit,
                    fingerprint: digest,
                    n_chunks,
                    prev_chunks: Some(done.n_chunks),
                });
            }
            None => {
                plan.pending.push(PendingDoc {
                    unit,
                    fingerprint: digest,
                    n_chunks,
                    prev_chunks: None,
                });
            }
        }
    }

    plan
}

/// INDEXING phase for one document. WAL events for the document are emitted
/// strictly after the store acknowledges the corresponding writes; the final
/// doc_committed is emitted only once every batch (and any orphan deletion)
/// has been acknowledged.
#[allow(clippy::too_many_arguments)]
async fn index_document(
    client: &LanceDbClient,
    embedder: &GroqEmbeddingClient,
    writer: &WalWriter,
    chunking: &ChunkingConfig,
    embed_batch_size: usize,
    doc: PendingDoc,
    rows_total: &AtomicU64,
    progress: &ProgressTracker,
) -> Result<()> {
    let planner = ChunkPlanner::new(chunking.clone());
    let chunks = planner.plan(&doc.unit);
    let upserter = ChunkUpserter::new(client);
    let updated_at = now_secs();

    for batch in chunks.chunks(embed_batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let rows = upserter
            .upsert_batch(batch, &vectors, &doc.fingerprint, updated_at)
            .await?;

        let total = rows_total.fetch_add(rows, Ordering::SeqCst) + rows;
        writer.emit(EventKind::UpsertBatchCommitted {
            batch_size: rows,
            upsert_rows_committed_total: total,
        })?;

        progress.add_chunks_upserted(rows);
        progress.inc_batches_committed();
    }

    // A shrinking chunk count leaves stale trailing ids queryable unless
    // they are deleted before the document is marked done.
    if let Some(prev_chunks) = doc.prev_chunks
        && prev_chunks > doc.n_chunks
    {
        let orphans: Vec<String> = (doc.n_chunks..prev_chunks)
            .map(|index| chunk_id(&doc.unit.doc_id, index))
            .collect();
        upserter.delete_ids(&orphans).await?;
        progress.add_orphans_deleted(orphans.len() as u64);
        debug!(
            "Deleted {} orphaned chunks for {}",
            orphans.len(),
            doc.unit.source_uri
        );
    }

    writer.emit(EventKind::DocCommitted {
        source_uri: doc.unit.source_uri.clone(),
        doc_id: doc.unit.doc_id.clone(),
        content_sha256: doc.fingerprint.clone(),
        n_chunks: doc.n_chunks,
        updated_at,
    })?;

    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::SourceType;
    use std::collections::BTreeMap;

    fn conf() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 10,
            overlap_chars: 2,
            min_chars: 1,
        }
    }

    fn unit(uri: &str, text: &str) -> Unit {
        Unit::new(
            uri.to_string(),
            SourceType::Markdown,
            text.to_string(),
            BTreeMap::new(),
        )
    }

    fn done_entry(unit: &Unit, chunking: &ChunkingConfig) -> DoneDoc {
        let planner = ChunkPlanner::new(chunking.clone());
        DoneDoc {
            doc_id: unit.doc_id.clone(),
            content_sha256: fingerprint(unit, chunking),
            n_chunks: planner.plan_count(unit),
        }
    }

    #[test]
    fn test_unchanged_unit_is_satisfied() {
        let chunking = conf();
        let u = unit("docs/a.md", "stable content here");
        let mut done = HashMap::new();
        done.insert(u.source_uri.clone(), done_entry(&u, &chunking));

        let plan = plan_run(vec![u], &done, &chunking, false);
        assert_eq!(plan.planned, 1);
        assert_eq!(plan.satisfied, 1);
        assert!(plan.pending.is_empty());
    }

    #[test]
    fn test_edited_unit_is_pending_with_prev_count() {
        let chunking = conf();
        let old = unit("docs/a.md", "original content that spans several chunks");
        let mut done = HashMap::new();
        done.insert(old.source_uri.clone(), done_entry(&old, &chunking));

        let edited = unit("docs/a.md", "new");
        let plan = plan_run(vec![edited], &done, &chunking, false);

        assert_eq!(plan.satisfied, 0);
        assert_eq!(plan.pending.len(), 1);
        let pending = &plan.pending[0];
        assert_eq!(pending.prev_chunks, Some(done["docs/a.md"].n_chunks));
        assert_eq!(pending.n_chunks, 1);
    }

    #[test]
    fn test_chunking_change_invalidates_skip() {
        let chunking = conf();
        let u = unit("docs/a.md", "content that is split into chunks");
        let mut done = HashMap::new();
        done.insert(u.source_uri.clone(), done_entry(&u, &chunking));

        let rechunked = ChunkingConfig {
            max_chars: 6,
            overlap_chars: 1,
            min_chars: 1,
        };
        let plan = plan_run(vec![u], &done, &rechunked, false);

        assert_eq!(plan.satisfied, 0);
        assert_eq!(plan.pending.len(), 1);
    }

    #[test]
    fn test_new_unit_is_pending_without_prev() {
        let chunking = conf();
        let plan = plan_run(
            vec![unit("docs/new.md", "fresh")],
            &HashMap::new(),
            &chunking,
            false,
        );
        assert_eq!(plan.pending.len(), 1);
        assert_eq!(plan.pending[0].prev_chunks, None);
    }

    #[test]
    fn test_media_stub_not_planned() {
        let chunking = conf();
        let stub = Unit::new(
            "img/logo.png".to_string(),
            SourceType::MediaStub,
            "[media: img/logo.png]".to_string(),
            BTreeMap::new(),
        );

        let plan = plan_run(vec![stub.clone()], &HashMap::new(), &chunking, false);
        assert_eq!(plan.planned, 0);
        assert!(plan.pending.is_empty());

        let plan = plan_run(vec![stub], &HashMap::new(), &chunking, true);
        assert_eq!(plan.planned, 1);
        assert_eq!(plan.pending.len(), 1);
    }

    #[test]
    fn test_shrunk_doc_orphan_range() {
        // Chunk count 5 -> 3 must schedule ids 3 and 4 for deletion.
        let prev_chunks = 5u64;
        let n_chunks = 3u64;
        let orphans: Vec<String> = (n_chunks..prev_chunks)
            .map(|index| chunk_id("d1", index))
            .collect();
        assert_eq!(orphans, vec!["d1:3".to_string(), "d1:4".to_string()]);
    }
}
