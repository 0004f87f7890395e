// file: src/database/schema.rs
// description: LanceDB schema management for the chunks table
// reference: https://docs.rs/lancedb

use crate::database::client::LanceDbClient;
use crate::error::Result;
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchemaManager<'a> {
    client: &'a LanceDbClient,
}

impl<'a> SchemaManager<'a> {
    pub fn new(client: &'a LanceDbClient) -> Self {
        Self { client }
    }

    /// Creates the chunks table up front so concurrent upsert workers never
    /// race on first-write table creation.
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing LanceDB schema");

        let table_name = self.client.table_name();
        if self.client.table_exists(table_name).await? {
            info!("Chunks table already exists");
            return Ok(());
        }

        let schema = Self::get_chunks_schema(self.client.embedding_dim());
        self.client
            .get_connection()
            .create_empty_table(table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                crate::error::IndexError::Store(format!(
                    "Failed to create table {}: {}",
                    table_name, e
                ))
            })?;

        info!("Created empty chunks table: {}", table_name);
        Ok(())
    }

    pub async fn verify_schema(&self) -> Result<bool> {
        let table_name = self.client.table_name();

        if !self.client.table_exists(table_name).await? {
            warn!("Table '{}' does not exist", table_name);
            return Ok(false);
        }

        info!("Table '{}' exists", table_name);
        Ok(true)
    }

    /// Returns the Arrow schema for the chunks table. One row per chunk,
    /// keyed by the deterministic chunk id.
    pub fn get_chunks_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("source_uri", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("content_sha256", DataType::Utf8, false),
            Field::new("source_type", DataType::Utf8, false),
            Field::new("updated_at", DataType::UInt64, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    pub async fn drop_all_tables(&self) -> Result<()> {
        warn!("Dropping all tables in LanceDB");

        let table_name = self.client.table_name();

        if self.client.table_exists(table_name).await? {
            self.client
                .get_connection()
                .drop_table(table_name)
                .await
                .map_err(|e| {
                    crate::error::IndexError::Store(format!(
                        "Failed to drop table {}: {}",
                        table_name, e
                    ))
                })?;
            info!("Dropped table: {}", table_name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema = SchemaManager::get_chunks_schema(768);
        assert_eq!(schema.fields().len(), 9);

        let embedding_field = schema.field_with_name("embedding").unwrap();
        assert!(matches!(
            embedding_field.data_type(),
            DataType::FixedSizeList(_, 768)
        ));
        assert!(!schema.field_with_name("id").unwrap().is_nullable());
    }
}
