//! Embedding providers for corpus chunks and incoming queries.
//!
//! The index build and the query path must share one provider: the
//! published snapshot records [`EmbeddingProvider::model_id`] and the QA
//! engine refuses to search an index built by a different model, since a
//! silent mismatch degrades retrieval without any visible failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::retry::{RetryPolicy, send_with_retry};
use crate::types::RagError;
use crate::util::join_endpoint;

/// Largest number of texts sent to the remote model in one request.
const MAX_BATCH: usize = 64;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model and version.
    fn model_id(&self) -> &str;

    /// Dimension of the produced vectors.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("provider returned no embedding".to_string()))
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    dimension: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbeddings {
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = join_endpoint(&self.base_url, &["embeddings"])?;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            let request = self
                .client
                .post(endpoint.clone())
                .bearer_auth(&self.api_key)
                .json(&json!({ "model": self.model, "input": batch }));
            let response = send_with_retry(request, &self.retry, "openai.embeddings")
                .await
                .map_err(|err| RagError::Embedding(err.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                return Err(RagError::Embedding(format!(
                    "embeddings request failed with status {status}: {detail}"
                )));
            }

            let parsed: EmbeddingsResponse = response
                .json()
                .await
                .map_err(|err| RagError::Embedding(err.to_string()))?;
            let mut rows = parsed.data;
            if rows.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    rows.len()
                )));
            }
            rows.sort_by_key(|row| row.index);
            for row in rows {
                if row.embedding.len() != self.dimension {
                    return Err(RagError::Embedding(format!(
                        "model returned dimension {}, configured for {}",
                        row.embedding.len(),
                        self.dimension
                    )));
                }
                vectors.push(row.embedding);
            }
        }

        debug!(count = texts.len(), model = %self.model, "embedded texts");
        Ok(vectors)
    }
}

/// Deterministic in-process provider for tests and offline development.
///
/// Vectors are derived from a hash of the input text: equal texts map to
/// equal vectors, distinct texts almost surely differ, and no network is
/// involved. The call counter lets tests assert that a code path made no
/// embedding calls at all.
pub struct MockEmbeddingProvider {
    model_id: String,
    dimension: usize,
    calls: AtomicUsize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimension(8)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            model_id: "mock-embedder".to_string(),
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Number of embed calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dimension)
            .map(|i| {
                let bits = seed.rotate_left((i % 64) as u32) ^ ((i as u64) << 24);
                (bits as f32) / (u32::MAX as f32)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
