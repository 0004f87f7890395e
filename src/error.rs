// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus read failed for {path}: {source}")]
    Corpus {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Embedding error: {message}")]
    Embedding { message: String, retryable: bool },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("WAL write error: {0}")]
    Wal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    pub fn embedding_retryable(message: impl Into<String>) -> Self {
        IndexError::Embedding {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn embedding_fatal(message: impl Into<String>) -> Self {
        IndexError::Embedding {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether the orchestrator's retry policy may re-attempt the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Embedding { retryable: true, .. })
    }
}
