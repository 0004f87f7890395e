// file: src/database/upsert.rs
// description: idempotent batched chunk upserts keyed by deterministic chunk id
// reference: https://docs.rs/lancedb

use crate::chunker::Chunk;
use crate::database::client::LanceDbClient;
use crate::database::schema::SchemaManager;
use crate::error::{IndexError, Result};
use arrow_array::{
    FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array,
};
use futures::StreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ChunkUpserter<'a> {
    client: &'a LanceDbClient,
}

impl<'a> ChunkUpserter<'a> {
    pub fn new(client: &'a LanceDbClient) -> Self {
        Self { client }
    }

    /// Writes one batch of chunks with their embeddings. The write is a
    /// merge-insert keyed on `id`: a repeated batch (crash replay, retry)
    /// overwrites rows instead of duplicating them. Returns the number of
    /// rows acknowledged by the store.
    pub async fn upsert_batch(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_sha256: &str,
        updated_at: u64,
    ) -> Result<u64> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Store(format!(
                "Embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dim = self.client.embedding_dim();
        let schema = SchemaManager::get_chunks_schema(dim);
        let batch = Self::create_record_batch(
            schema.clone(),
            chunks,
            embeddings,
            content_sha256,
            updated_at,
            dim,
        )?;
        let rows = batch.num_rows() as u64;

        let table_name = self.client.table_name();

        if !self.client.table_exists(table_name).await? {
            self.client
                .get_connection()
                .create_table(
                    table_name,
                    RecordBatchIterator::new(vec![Ok(batch)], schema.clone()),
                )
                .execute()
                .await
                .map_err(|e| IndexError::Store(format!("Failed to create table: {}", e)))?;
            info!("Created new table: {}", table_name);
            return Ok(rows);
        }

        let table = self.client.get_table(table_name).await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(
                vec![Ok(batch)],
                schema,
            )))
            .await
            .map_err(|e| IndexError::Store(format!("Failed to upsert batch: {}", e)))?;

        debug!("Upserted {} chunk rows into {}", rows, table_name);
        Ok(rows)
    }

    /// Returns which of the given chunk ids exist in the store. Read-only;
    /// used by the coverage auditor and by tests.
    pub async fn present_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let table_name = self.client.table_name();
        if ids.is_empty() || !self.client.table_exists(table_name).await? {
            return Ok(HashSet::new());
        }

        let table = self.client.get_table(table_name).await?;
        let filter = id_filter(ids);

        let mut stream = table
            .query()
            .only_if(filter)
            .execute()
            .await
            .map_err(|e| IndexError::Store(format!("Failed to query chunk ids: {}", e)))?;

        let mut present = HashSet::new();
        while let Some(batch_result) = stream.next().await {
            let batch = batch_result
                .map_err(|e| IndexError::Store(format!("Failed to read result batch: {}", e)))?;

            let id_column = batch
                .column_by_name("id")
                .ok_or_else(|| IndexError::Store("Missing 'id' column".to_string()))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| IndexError::Store("Invalid 'id' column type".to_string()))?;

            for i in 0..batch.num_rows() {
                present.insert(id_column.value(i).to_string());
            }
        }

        Ok(present)
    }

    /// Deletes the given chunk ids; used to drop orphaned trailing chunks
    /// when a document's chunk count shrinks across runs.
    pub async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        let table_name = self.client.table_name();
        if ids.is_empty() || !self.client.table_exists(table_name).await? {
            return Ok(());
        }

        let table = self.client.get_table(table_name).await?;
        let predicate = id_filter(ids);
        debug!("Deleting {} orphaned chunk ids", ids.len());

        table
            .delete(&predicate)
            .await
            .map_err(|e| IndexError::Store(format!("Failed to delete chunk ids: {}", e)))?;

        Ok(())
    }

    fn create_record_batch(
        schema: Arc<arrow_schema::Schema>,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_sha256: &str,
        updated_at: u64,
        dim: usize,
    ) -> Result<RecordBatch> {
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            if embedding.len() != dim {
                return Err(IndexError::Store(format!(
                    "Embedding for chunk {} has dimension {}, expected {}",
                    chunk.id(),
                    embedding.len(),
                    dim
                )));
            }
        }

        let ids: StringArray = chunks.iter().map(|c| Some(c.id())).collect();
        let doc_ids: StringArray = chunks.iter().map(|c| Some(c.doc_id.clone())).collect();
        let source_uris: StringArray = chunks
            .iter()
            .map(|c| c.metadata.get("source_uri").cloned())
            .map(|v| Some(v.unwrap_or_default()))
            .collect();
        let chunk_indices: UInt64Array = chunks.iter().map(|c| Some(c.index)).collect();
        let texts: StringArray = chunks.iter().map(|c| Some(c.text.clone())).collect();
        let hashes: StringArray = chunks
            .iter()
            .map(|_| Some(content_sha256.to_string()))
            .collect();
        let source_types: StringArray = chunks
            .iter()
            .map(|c| c.metadata.get("source_type").cloned())
            .map(|v| Some(v.unwrap_or_default()))
            .collect();
        let updated_ats: UInt64Array = chunks.iter().map(|_| Some(updated_at)).collect();

        let embedding_values: Float32Array = embeddings
            .iter()
            .flat_map(|embedding| embedding.iter().copied())
            .collect();

        let embedding_list =
            FixedSizeListArray::try_new_from_values(embedding_values, dim as i32).map_err(
                |e| IndexError::Store(format!("Failed to create embedding array: {}", e)),
            )?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(doc_ids),
                Arc::new(source_uris),
                Arc::new(chunk_indices),
                Arc::new(texts),
                Arc::new(hashes),
                Arc::new(source_types),
                Arc::new(updated_ats),
                Arc::new(embedding_list),
            ],
        )
        .map_err(|e| IndexError::Store(format!("Failed to create record batch: {}", e)))
    }
}

/// Builds an `id IN (...)` predicate over single-quoted, escaped literals.
fn id_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect();
    format!("id IN ({})", quoted.join(", "))
}
