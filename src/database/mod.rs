// file: src/database/mod.rs
// description: database operations module exports
// reference: internal module structure

pub mod client;
pub mod embeddings;
pub mod schema;
pub mod upsert;

pub use client::LanceDbClient;
pub use embeddings::{GroqEmbeddingClient, RetryPolicy};
pub use schema::SchemaManager;
pub use upsert::ChunkUpserter;
