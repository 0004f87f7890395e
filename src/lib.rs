// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod database;
pub mod error;
pub mod pipeline;
pub mod utils;
pub mod wal;

pub use chunker::{Chunk, ChunkPlanner, chunk_id, fingerprint, should_index_unit};
pub use config::{
    ChunkingConfig, Config, CorpusConfig, DatabaseConfig, PipelineConfig, WalConfig,
};
pub use corpus::{FsUnitSource, SourceType, TextNormalizer, Unit, derive_doc_id};
pub use database::{ChunkUpserter, GroqEmbeddingClient, LanceDbClient, RetryPolicy, SchemaManager};
pub use error::{IndexError, Result};
pub use pipeline::{CoverageAuditor, CoverageReport, IndexOrchestrator, IndexStats, ProgressTracker};
pub use utils::Validator;
pub use wal::{DoneDoc, EventKind, ResumeState, SyncMode, WalEvent, WalScope, WalWriter, read_wal};
