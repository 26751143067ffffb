//! Question answering over the published index snapshot.
//!
//! Stages per query: embed → retrieve → generate → aggregate. Each stage
//! logs its duration, and the whole path reads one index snapshot so a
//! concurrent rebuild can never change the view mid-request.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::completion::CompletionProvider;
use crate::embeddings::EmbeddingProvider;
use crate::pipeline::SharedIndex;
use crate::types::{AnswerResult, RagError};

/// Instructions placed ahead of the stuffed context.
const SYSTEM_PREAMBLE: &str = "Use the following pieces of context to answer the user's \
question. If the answer is not contained in the context, say that you don't know instead \
of guessing.";

pub struct QaEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    shared: Arc<SharedIndex>,
    top_k: usize,
}

impl QaEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        shared: Arc<SharedIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            completer,
            shared,
            top_k,
        }
    }

    /// Answers a query from the indexed corpus.
    ///
    /// Empty queries are rejected before any remote call. Retrieval
    /// returning nothing is allowed: the model is still asked, with an
    /// empty context, and the miss is logged.
    pub async fn answer(&self, query: &str) -> Result<AnswerResult, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let snapshot = self.shared.load();
        if snapshot.embedder_id != self.embedder.model_id() {
            return Err(RagError::Embedding(format!(
                "index '{}' was built with embedding model '{}' but queries use '{}'",
                snapshot.index_name,
                snapshot.embedder_id,
                self.embedder.model_id()
            )));
        }

        let started = Instant::now();
        let query_embedding = self.embedder.embed_query(query).await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedded query"
        );

        let started = Instant::now();
        let hits = snapshot
            .index
            .search(&snapshot.index_name, &query_embedding, self.top_k)
            .await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            hits = hits.len(),
            "retrieved context"
        );
        if hits.is_empty() {
            warn!(
                generation = snapshot.generation,
                "retrieval returned no chunks; answering without grounding"
            );
        }

        let context = hits
            .iter()
            .map(|(record, _)| record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let system = format!("{SYSTEM_PREAMBLE}\n\nContext:\n{context}");

        let started = Instant::now();
        let answer = self.completer.complete(&system, query).await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            model = self.completer.model_id(),
            "generated answer"
        );

        let mut sources: Vec<String> = Vec::new();
        for (record, _) in &hits {
            if !sources.iter().any(|existing| existing == &record.source_id) {
                sources.push(record.source_id.clone());
            }
        }

        info!(
            generation = snapshot.generation,
            sources = sources.len(),
            "answered query"
        );
        Ok(AnswerResult {
            answer,
            sources,
        })
    }
}
