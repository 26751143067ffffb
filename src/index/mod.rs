//! Vector index adapters.
//!
//! [`VectorIndex`] abstracts the similarity-search service the pipeline
//! writes to and the QA engine reads from, so code never depends on one
//! backing store:
//!
//! ```text
//!                  ┌───────────────────┐
//!                  │ VectorIndex trait │
//!                  └─────────┬─────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!     ┌─────────────────┐        ┌──────────────────┐
//!     │ RestVectorIndex │        │ MemoryVectorIndex │
//!     │ (remote service)│        │ (tests, local dev)│
//!     └─────────────────┘        └──────────────────┘
//! ```

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use memory::MemoryVectorIndex;
pub use remote::RestVectorIndex;

/// A chunk with its embedding, ready for storage in an index.
///
/// The text fields travel as metadata next to the vector so search
/// results can be turned back into citable context without a second
/// lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this chunk.
    pub id: String,
    /// File name of the originating document.
    pub source_id: String,
    /// Zero-based index of this chunk within its source.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
    /// The embedding vector (if computed).
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            chunk_index,
            content: content.into(),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Unified interface over similarity-search backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Ensures the named index exists with the given dimension.
    ///
    /// Absent: created. Present and `force` false: no-op. Present and
    /// `force` true: dropped and recreated empty.
    async fn create_index(&self, name: &str, dimension: usize, force: bool)
    -> Result<(), RagError>;

    /// Drops the named index; `IndexNotFound` when it does not exist.
    async fn drop_index(&self, name: &str) -> Result<(), RagError>;

    /// Bulk-loads vectors, making them searchable. Records without an
    /// embedding are skipped.
    async fn upsert(&self, name: &str, chunks: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Returns up to `top_k` nearest neighbors by cosine similarity, most
    /// similar first. `IndexUnavailable` when the index does not exist or
    /// the service is unreachable.
    async fn search(
        &self,
        name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError>;

    /// Number of vectors currently stored.
    async fn count(&self, name: &str) -> Result<usize, RagError>;

    /// Whether the named index exists.
    async fn has_index(&self, name: &str) -> Result<bool, RagError>;
}
