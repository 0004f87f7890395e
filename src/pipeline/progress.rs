// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for index runs
// reference: uses indicatif for progress bars and tracks processing metrics

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub docs_planned: usize,
    pub docs_satisfied: usize,
    pub docs_indexed: usize,
    pub docs_failed: usize,
    pub chunks_upserted: u64,
    pub batches_committed: u64,
    pub orphan_chunks_deleted: u64,
    pub duration_secs: u64,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn docs_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.docs_indexed as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.docs_indexed + self.docs_failed;
        if attempted == 0 {
            return 100.0;
        }
        (self.docs_indexed as f64 / attempted as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    docs_planned: usize,
    docs_satisfied: usize,
    docs_indexed: Arc<AtomicUsize>,
    docs_failed: Arc<AtomicUsize>,
    chunks_upserted: Arc<AtomicU64>,
    batches_committed: Arc<AtomicU64>,
    orphan_chunks_deleted: Arc<AtomicU64>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(docs_planned: usize, docs_satisfied: usize, docs_to_index: usize) -> Self {
        let multi_progress = MultiProgress::new();

        let main_bar = create_progress_bar(&multi_progress, docs_to_index as u64);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            docs_planned,
            docs_satisfied,
            docs_indexed: Arc::new(AtomicUsize::new(0)),
            docs_failed: Arc::new(AtomicUsize::new(0)),
            chunks_upserted: Arc::new(AtomicU64::new(0)),
            batches_committed: Arc::new(AtomicU64::new(0)),
            orphan_chunks_deleted: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_docs_indexed(&self) {
        self.docs_indexed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_docs_failed(&self) {
        self.docs_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn add_chunks_upserted(&self, chunks: u64) {
        self.chunks_upserted.fetch_add(chunks, Ordering::SeqCst);
    }

    pub fn inc_batches_committed(&self) {
        self.batches_committed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_orphans_deleted(&self, chunks: u64) {
        self.orphan_chunks_deleted.fetch_add(chunks, Ordering::SeqCst);
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Indexing complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> IndexStats {
        let duration = self.start_time.elapsed().as_secs();

        IndexStats {
            docs_planned: self.docs_planned,
            docs_satisfied: self.docs_satisfied,
            docs_indexed: self.docs_indexed.load(Ordering::SeqCst),
            docs_failed: self.docs_failed.load(Ordering::SeqCst),
            chunks_upserted: self.chunks_upserted.load(Ordering::SeqCst),
            batches_committed: self.batches_committed.load(Ordering::SeqCst),
            orphan_chunks_deleted: self.orphan_chunks_deleted.load(Ordering::SeqCst),
            duration_secs: duration,
        }
    }

    fn update_detail_bar(&self) {
        let indexed = self.docs_indexed.load(Ordering::SeqCst);
        let failed = self.docs_failed.load(Ordering::SeqCst);
        let batches = self.batches_committed.load(Ordering::SeqCst);

        let message = format!(
            "Indexed: {} | Satisfied: {} | Failed: {} | Batches: {}",
            indexed, self.docs_satisfied, failed, batches
        );

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .expect("Failed to create progress bar template")
            .progress_chars("█▓▒░"),
    );
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .expect("Failed to create detail bar template");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_calculations() {
        let mut stats = IndexStats::new();
        stats.docs_indexed = 90;
        stats.docs_failed = 10;
        stats.duration_secs = 9;

        assert_eq!(stats.docs_per_second(), 10.0);
        assert!((stats.success_rate() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_zero_duration() {
        let stats = IndexStats::new();
        assert_eq!(stats.docs_per_second(), 0.0);
        assert_eq!(stats.success_rate(), 100.0);
    }

    #[test]
    fn test_tracker_counters() {
        let tracker = ProgressTracker::new(10, 4, 6);

        tracker.inc_docs_indexed();
        tracker.add_chunks_upserted(12);
        tracker.inc_batches_committed();
        tracker.add_orphans_deleted(2);

        let stats = tracker.get_stats();
        assert_eq!(stats.docs_planned, 10);
        assert_eq!(stats.docs_satisfied, 4);
        assert_eq!(stats.docs_indexed, 1);
        assert_eq!(stats.chunks_upserted, 12);
        assert_eq!(stats.batches_committed, 1);
        assert_eq!(stats.orphan_chunks_deleted, 2);
    }

    #[test]
    fn test_tracker_failures() {
        let tracker = ProgressTracker::new(5, 0, 5);

        tracker.inc_docs_failed();
        tracker.inc_docs_failed();

        let stats = tracker.get_stats();
        assert_eq!(stats.docs_failed, 2);
    }
}
