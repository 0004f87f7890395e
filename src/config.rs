// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{IndexError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub database: DatabaseConfig,
    pub wal: WalConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    pub root_dir: PathBuf,
    pub skip_patterns: Vec<String>,
    pub max_file_size_mb: usize,
    pub include_media_stubs: bool,
}

/// Chunk boundary parameters. Changing any of them changes every unit's
/// fingerprint and forces re-chunking on the next run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub table_name: String,
    pub batch_size: usize,
    pub embedding_dim: usize,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalConfig {
    pub path: PathBuf,
    pub sync_mode: crate::wal::SyncMode,
    pub fsync_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub parallel_workers: usize,
    pub embed_batch_size: usize,
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RAG_INDEXER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            corpus: CorpusConfig {
                root_dir: PathBuf::from("./corpus"),
                skip_patterns: vec![
                    "*.zip".to_string(),
                    "*.lock".to_string(),
                    ".git/*".to_string(),
                ],
                max_file_size_mb: 10,
                include_media_stubs: false,
            },
            chunking: ChunkingConfig {
                max_chars: 1200,
                overlap_chars: 200,
                min_chars: 120,
            },
            database: DatabaseConfig {
                uri: "data/lancedb".to_string(),
                table_name: "chunks".to_string(),
                batch_size: 64,
                embedding_dim: 768,
                groq_api_key: None,
                groq_model: "openai/gpt-oss-120b".to_string(),
            },
            wal: WalConfig {
                path: PathBuf::from("data/index.wal"),
                sync_mode: crate::wal::SyncMode::Flush,
                fsync_interval_ms: 1000,
            },
            pipeline: PipelineConfig {
                parallel_workers: 4,
                embed_batch_size: 16,
                max_retries: 3,
                retry_backoff_ms: 500,
                request_timeout_secs: 30,
            },
        }
    }

    /// Identity hash for the row shape written to the store. Runs whose WAL
    /// events carry a different schema hash are invisible to each other.
    /// Chunking parameters are deliberately excluded: changing them shows up
    /// per document via the content fingerprint, not as a new WAL scope.
    pub fn schema_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.database.table_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.database.embedding_dim.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(self.database.groq_model.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(IndexError::Config(
                "chunking.max_chars must be greater than 0".to_string(),
            ));
        }

        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(IndexError::Config(format!(
                "chunking.overlap_chars ({}) must be less than max_chars ({})",
                self.chunking.overlap_chars, self.chunking.max_chars
            )));
        }

        if self.chunking.min_chars > self.chunking.max_chars {
            return Err(IndexError::Config(format!(
                "chunking.min_chars ({}) must not exceed max_chars ({})",
                self.chunking.min_chars, self.chunking.max_chars
            )));
        }

        if self.pipeline.parallel_workers == 0 {
            return Err(IndexError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.embed_batch_size == 0 {
            return Err(IndexError::Config(
                "embed_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.database.batch_size == 0 {
            return Err(IndexError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.database.embedding_dim == 0 {
            return Err(IndexError::Config(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = Config::default_config();
        config.chunking.overlap_chars = config.chunking.max_chars;
        assert!(config.validate().is_err());

        config.chunking.overlap_chars = config.chunking.max_chars + 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_chars_bounded_by_max_chars() {
        let mut config = Config::default_config();
        config.chunking.min_chars = config.chunking.max_chars + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default_config();
        config.pipeline.parallel_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schema_hash_stable_and_sensitive() {
        let config = Config::default_config();
        assert_eq!(config.schema_hash(), config.schema_hash());
        assert_eq!(config.schema_hash().len(), 16);

        let mut other = Config::default_config();
        other.database.embedding_dim = 1024;
        assert_ne!(config.schema_hash(), other.schema_hash());
    }

    #[test]
    fn test_schema_hash_ignores_chunking() {
        let config = Config::default_config();
        let mut rechunked = Config::default_config();
        rechunked.chunking.max_chars = 400;
        assert_eq!(config.schema_hash(), rechunked.schema_hash());
    }
}
