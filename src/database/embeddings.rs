// file: src/database/embeddings.rs
// description: Groq API integration for batched text embeddings with bounded retry
// reference: https://console.groq.com/docs/embeddings

use crate::error::{IndexError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GROQ_EMBEDDINGS_URL: &str = "https://api.groq.com/openai/v1/embeddings";

#[derive(Debug, Serialize)]
struct GroqEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GroqEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Retry policy applied to retryable embedding failures (timeouts, 429,
/// 5xx). Fatal failures (other 4xx, dimension drift) abort immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff: Duration,
    pub request_timeout: Duration,
}

pub struct GroqEmbeddingClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    dim: usize,
    retry: RetryPolicy,
}

impl GroqEmbeddingClient {
    pub fn new(api_key: Option<String>, model: String, dim: usize, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(retry.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        if api_key.is_none() {
            warn!("No Groq API key configured - using deterministic fallback embeddings");
        }

        Self {
            client,
            api_key,
            model,
            dim,
            retry,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embeds one batch of texts, preserving input order. Retryable failures
    /// are re-attempted up to the policy's bound with linear backoff; the
    /// last error surfaces once retries are exhausted.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(texts
                .iter()
                .map(|text| Self::generate_fallback_embedding(text, self.dim))
                .collect());
        };

        let mut attempt = 0usize;
        loop {
            match self.request_embeddings(api_key, texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff * attempt as u32;
                    warn!(
                        "Embedding attempt {}/{} failed ({}); retrying in {:?}",
                        attempt, self.retry.max_retries, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_embeddings(&self, api_key: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = GroqEmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        debug!("Requesting embeddings for batch of {}", texts.len());

        let response = self
            .client
            .post(GROQ_EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    IndexError::embedding_retryable(format!("Groq API request failed: {}", e))
                } else {
                    IndexError::embedding_fatal(format!("Groq API request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("Groq API returned status {}: {}", status, error_text);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(IndexError::embedding_retryable(message))
            } else {
                Err(IndexError::embedding_fatal(message))
            };
        }

        let mut parsed: GroqEmbeddingResponse = response.json().await.map_err(|e| {
            IndexError::embedding_fatal(format!("Failed to parse Groq API response: {}", e))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(IndexError::embedding_fatal(format!(
                "Groq API returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        // The API may reorder items; the index field restores input order.
        parsed.data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for item in parsed.data {
            if item.embedding.len() != self.dim {
                return Err(IndexError::embedding_fatal(format!(
                    "Groq API returned embedding with dimension {}, expected {}",
                    item.embedding.len(),
                    self.dim
                )));
            }
            vectors.push(item.embedding);
        }

        Ok(vectors)
    }

    /// Deterministic embedding used when no API key is configured. Not
    /// semantically meaningful; keeps the pipeline exercisable offline.
    pub fn generate_fallback_embedding(text: &str, dim: usize) -> Vec<f32> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_add(b as u64));
        (0..dim)
            .map(|i| (hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_fallback_embedding() {
        let embedding = GroqEmbeddingClient::generate_fallback_embedding("test text", 384);
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_fallback_embedding_deterministic() {
        let emb1 = GroqEmbeddingClient::generate_fallback_embedding("same text", 128);
        let emb2 = GroqEmbeddingClient::generate_fallback_embedding("same text", 128);
        assert_eq!(emb1, emb2);
    }

    #[tokio::test]
    async fn test_embed_batch_without_key_uses_fallback() {
        let client = GroqEmbeddingClient::new(
            None,
            "openai/gpt-oss-120b".to_string(),
            16,
            test_policy(),
        );

        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 16));
        assert_eq!(
            vectors[0],
            GroqEmbeddingClient::generate_fallback_embedding("alpha", 16)
        );
    }

    #[tokio::test]
    async fn test_embed_empty_batch() {
        let client = GroqEmbeddingClient::new(
            None,
            "openai/gpt-oss-120b".to_string(),
            16,
            test_policy(),
        );
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
