// file: src/pipeline/coverage.rs
// description: read-only audit of store coverage against recomputed chunk ids
// reference: internal coverage check interface

use crate::chunker::{ChunkPlanner, should_index_unit};
use crate::config::Config;
use crate::corpus::FsUnitSource;
use crate::database::{ChunkUpserter, LanceDbClient};
use crate::error::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub expected: usize,
    pub present: usize,
    pub missing: Vec<String>,
}

impl CoverageReport {
    pub fn coverage_pct(&self) -> f64 {
        if self.expected == 0 {
            return 100.0;
        }
        (self.present as f64 / self.expected as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Recomputes every expected chunk id from the unit source and chunking
/// parameters, then checks the store for presence. Requires no WAL access;
/// the WAL records progress, the store is the ground truth being audited.
pub struct CoverageAuditor<'a> {
    client: &'a LanceDbClient,
    config: &'a Config,
}

impl<'a> CoverageAuditor<'a> {
    pub fn new(client: &'a LanceDbClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    pub async fn audit(&self) -> Result<CoverageReport> {
        info!("Auditing store coverage");

        let source = FsUnitSource::new(self.config.corpus.clone());
        let units = source.scan()?;
        let planner = ChunkPlanner::new(self.config.chunking.clone());

        let mut expected_ids: Vec<String> = Vec::new();
        for unit in &units {
            if !should_index_unit(unit, self.config.corpus.include_media_stubs) {
                continue;
            }
            for chunk in planner.plan(unit) {
                expected_ids.push(chunk.id());
            }
        }

        info!("Expecting {} chunk ids across {} units", expected_ids.len(), units.len());

        let upserter = ChunkUpserter::new(self.client);
        let mut report = CoverageReport {
            expected: expected_ids.len(),
            ..Default::default()
        };

        for batch in expected_ids.chunks(self.client.batch_size().max(1)) {
            let present = upserter.present_ids(batch).await?;
            for id in batch {
                if present.contains(id) {
                    report.present += 1;
                } else {
                    debug!("Missing chunk id: {}", id);
                    report.missing.push(id.clone());
                }
            }
        }

        info!(
            "Coverage: {}/{} present ({:.2}%), {} missing",
            report.present,
            report.expected,
            report.coverage_pct(),
            report.missing.len()
        );

        Ok(report)
    }
}
