//! REST adapter for a remote vector index service.
//!
//! Speaks a small Pinecone-style HTTP protocol:
//!
//! * `POST   /indexes`                : create `{name, dimension, metric}`
//! * `GET    /indexes/{name}`         : describe, `{name, ready}`
//! * `DELETE /indexes/{name}`         : drop
//! * `GET    /indexes/{name}/stats`   : `{vector_count}`
//! * `POST   /indexes/{name}/vectors` : bulk upsert
//! * `POST   /indexes/{name}/query`   : nearest neighbors
//!
//! Transient failures are retried with backoff; index creation polls the
//! describe endpoint until the service reports the index ready, bounded
//! by a creation timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::{ChunkRecord, VectorIndex};
use crate::retry::{RetryPolicy, send_with_retry};
use crate::types::RagError;
use crate::util::join_endpoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Vectors sent per upsert request.
const UPSERT_BATCH: usize = 100;

pub struct RestVectorIndex {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
    create_timeout: Duration,
    create_poll_interval: Duration,
}

impl RestVectorIndex {
    pub fn new(base_url: Url, api_key: Option<String>) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RagError::IndexUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            retry: RetryPolicy::default(),
            create_timeout: Duration::from_secs(60),
            create_poll_interval: Duration::from_millis(500),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the creation-readiness deadline and poll cadence.
    #[must_use]
    pub fn with_create_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.create_timeout = timeout;
        self.create_poll_interval = poll_interval;
        self
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, label: &str) -> Result<Response, RagError> {
        send_with_retry(builder, &self.retry, label)
            .await
            .map_err(|err| RagError::IndexUnavailable(err.to_string()))
    }

    /// Polls the describe endpoint until the index reports ready or the
    /// creation deadline passes.
    async fn wait_until_ready(&self, name: &str) -> Result<(), RagError> {
        let deadline = tokio::time::Instant::now() + self.create_timeout;
        loop {
            let url = join_endpoint(&self.base_url, &["indexes", name])?;
            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(|err| RagError::IndexUnavailable(err.to_string()))?;

            match response.status() {
                StatusCode::NOT_FOUND => {
                    // Creation accepted but the index is not visible yet.
                }
                status if status.is_success() => {
                    let description: IndexDescription = response
                        .json()
                        .await
                        .map_err(|err| RagError::IndexUnavailable(err.to_string()))?;
                    if description.ready.unwrap_or(true) {
                        return Ok(());
                    }
                }
                _ => {
                    return Err(RagError::IndexCreation {
                        name: name.to_string(),
                        reason: error_detail(response).await,
                    });
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(RagError::IndexCreation {
                    name: name.to_string(),
                    reason: format!("index was not ready within {:?}", self.create_timeout),
                });
            }
            tokio::time::sleep(self.create_poll_interval).await;
        }
    }
}

#[derive(Deserialize)]
struct IndexDescription {
    ready: Option<bool>,
}

#[derive(Deserialize)]
struct StatsResponse {
    vector_count: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: MatchMetadata,
}

#[derive(Deserialize)]
struct MatchMetadata {
    source_id: String,
    chunk_index: usize,
    content: String,
}

async fn error_detail(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}

#[async_trait]
impl VectorIndex for RestVectorIndex {
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        force: bool,
    ) -> Result<(), RagError> {
        if self.has_index(name).await? {
            if !force {
                debug!(index = name, "index already exists, keeping it");
                return Ok(());
            }
            info!(index = name, "dropping index before recreation");
            self.drop_index(name).await?;
        }

        info!(index = name, dimension, "creating index");
        let url = join_endpoint(&self.base_url, &["indexes"])?;
        let body = json!({ "name": name, "dimension": dimension, "metric": "cosine" });
        let response = self
            .send(self.request(Method::POST, url).json(&body), "vector.create")
            .await?;

        match response.status() {
            status if status.is_success() => self.wait_until_ready(name).await,
            StatusCode::CONFLICT => Err(RagError::IndexCreation {
                name: name.to_string(),
                reason: "an index with this name already exists".to_string(),
            }),
            _ => Err(RagError::IndexCreation {
                name: name.to_string(),
                reason: error_detail(response).await,
            }),
        }
    }

    async fn drop_index(&self, name: &str) -> Result<(), RagError> {
        let url = join_endpoint(&self.base_url, &["indexes", name])?;
        let response = self
            .send(self.request(Method::DELETE, url), "vector.drop")
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RagError::IndexNotFound(name.to_string())),
            _ => Err(RagError::IndexUnavailable(error_detail(response).await)),
        }
    }

    async fn upsert(&self, name: &str, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        let with_vectors: Vec<ChunkRecord> = chunks
            .into_iter()
            .filter(|chunk| chunk.embedding.is_some())
            .collect();
        if with_vectors.is_empty() {
            return Ok(());
        }

        let url = join_endpoint(&self.base_url, &["indexes", name, "vectors"])?;
        for batch in with_vectors.chunks(UPSERT_BATCH) {
            let vectors: Vec<_> = batch
                .iter()
                .map(|chunk| {
                    json!({
                        "id": chunk.id,
                        "values": chunk.embedding,
                        "metadata": {
                            "source_id": chunk.source_id,
                            "chunk_index": chunk.chunk_index,
                            "content": chunk.content,
                        },
                    })
                })
                .collect();
            let response = self
                .send(
                    self.request(Method::POST, url.clone())
                        .json(&json!({ "vectors": vectors })),
                    "vector.upsert",
                )
                .await?;

            match response.status() {
                status if status.is_success() => {}
                StatusCode::NOT_FOUND => return Err(RagError::IndexNotFound(name.to_string())),
                _ => return Err(RagError::IndexUnavailable(error_detail(response).await)),
            }
        }

        debug!(index = name, vectors = with_vectors.len(), "upserted vectors");
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        let url = join_endpoint(&self.base_url, &["indexes", name, "query"])?;
        let body = json!({
            "vector": query_embedding,
            "top_k": top_k,
            "include_metadata": true,
        });
        let response = self
            .send(self.request(Method::POST, url).json(&body), "vector.query")
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(RagError::IndexUnavailable(format!(
                    "index '{name}' does not exist"
                )));
            }
            _ => return Err(RagError::IndexUnavailable(error_detail(response).await)),
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|err| RagError::IndexUnavailable(err.to_string()))?;
        let hits = parsed
            .matches
            .into_iter()
            .take(top_k)
            .map(|hit| {
                let record = ChunkRecord::new(
                    hit.id,
                    hit.metadata.source_id,
                    hit.metadata.chunk_index,
                    hit.metadata.content,
                );
                (record, hit.score)
            })
            .collect();
        Ok(hits)
    }

    async fn count(&self, name: &str) -> Result<usize, RagError> {
        let url = join_endpoint(&self.base_url, &["indexes", name, "stats"])?;
        let response = self
            .send(self.request(Method::GET, url), "vector.stats")
            .await?;

        match response.status() {
            status if status.is_success() => {
                let stats: StatsResponse = response
                    .json()
                    .await
                    .map_err(|err| RagError::IndexUnavailable(err.to_string()))?;
                Ok(stats.vector_count)
            }
            StatusCode::NOT_FOUND => Err(RagError::IndexNotFound(name.to_string())),
            _ => Err(RagError::IndexUnavailable(error_detail(response).await)),
        }
    }

    async fn has_index(&self, name: &str) -> Result<bool, RagError> {
        let url = join_endpoint(&self.base_url, &["indexes", name])?;
        let response = self
            .send(self.request(Method::GET, url), "vector.describe")
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(RagError::IndexUnavailable(error_detail(response).await)),
        }
    }
}
