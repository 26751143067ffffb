//! Error taxonomy and core data types shared across the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the ingestion and question answering pipeline.
///
/// Remote-service failures keep their origin visible (`Embedding`,
/// `Completion`, the index variants) so the HTTP layer can map each kind
/// to a distinct status instead of collapsing everything into a 500.
#[derive(Debug, Error)]
pub enum RagError {
    /// The vector service rejected or timed out an index creation.
    #[error("failed to create index '{name}': {reason}")]
    IndexCreation { name: String, reason: String },

    /// The named index does not exist on the vector service.
    #[error("index '{0}' not found")]
    IndexNotFound(String),

    /// The vector service is unreachable or refused the request.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding model call failed.
    #[error("embedding service error: {0}")]
    Embedding(String),

    /// The completion model call failed.
    #[error("completion service error: {0}")]
    Completion(String),

    /// The incoming query was empty or whitespace-only.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A source file could not be turned into a text document.
    #[error("invalid document '{source_id}': {reason}")]
    InvalidDocument { source_id: String, reason: String },

    /// Missing or malformed runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem failure (uploads, archiving, directory scans).
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw text document produced by the extractor.
///
/// `source_id` is the bare file name; the answer surface reports sources
/// by this name, so it must stay stable across the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Answer to a single query together with the distinct sources that
/// grounded it. Ephemeral; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Distinct source ids in retrieval order (deduplicated by source,
    /// not by chunk).
    pub sources: Vec<String>,
}
