//! In-process vector index used by tests and local development.
//!
//! Brute-force cosine scan over stored vectors; entirely sufficient for
//! the corpus sizes the test-suite works with, and it keeps the whole
//! pipeline runnable without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ChunkRecord, VectorIndex};
use crate::types::RagError;

struct MemoryIndex {
    dimension: usize,
    records: Vec<ChunkRecord>,
}

/// Thread-safe map of named in-memory indexes.
#[derive(Default)]
pub struct MemoryVectorIndex {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        force: bool,
    ) -> Result<(), RagError> {
        let mut guard = self.indexes.write();
        if guard.contains_key(name) && !force {
            return Ok(());
        }
        guard.insert(
            name.to_string(),
            MemoryIndex {
                dimension,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn drop_index(&self, name: &str) -> Result<(), RagError> {
        let mut guard = self.indexes.write();
        guard
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RagError::IndexNotFound(name.to_string()))
    }

    async fn upsert(&self, name: &str, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        let mut guard = self.indexes.write();
        let index = guard
            .get_mut(name)
            .ok_or_else(|| RagError::IndexNotFound(name.to_string()))?;
        for chunk in chunks {
            let Some(embedding) = chunk.embedding.as_ref() else {
                continue;
            };
            if embedding.len() != index.dimension {
                return Err(RagError::IndexUnavailable(format!(
                    "vector dimension {} does not match index dimension {}",
                    embedding.len(),
                    index.dimension
                )));
            }
            match index.records.iter_mut().find(|record| record.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => index.records.push(chunk),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        let guard = self.indexes.read();
        let index = guard.get(name).ok_or_else(|| {
            RagError::IndexUnavailable(format!("index '{name}' does not exist"))
        })?;
        let mut hits: Vec<(ChunkRecord, f32)> = index
            .records
            .iter()
            .filter_map(|record| {
                record
                    .embedding
                    .as_deref()
                    .map(|embedding| (record.clone(), cosine_similarity(embedding, query_embedding)))
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, name: &str) -> Result<usize, RagError> {
        let guard = self.indexes.read();
        let index = guard
            .get(name)
            .ok_or_else(|| RagError::IndexNotFound(name.to_string()))?;
        Ok(index.records.len())
    }

    async fn has_index(&self, name: &str) -> Result<bool, RagError> {
        Ok(self.indexes.read().contains_key(name))
    }
}
