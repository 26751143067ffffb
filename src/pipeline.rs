//! Ingestion orchestration: extract → chunk → embed → upsert → archive.
//!
//! Also owns the published [`IndexSnapshot`] that query traffic reads.
//! Rebuild and purge serialize on an async mutex; queries never take it.
//! A query clones the current snapshot and keeps using it until it
//! finishes, so a rebuild can never tear the view out from under an
//! in-flight request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunker::RecursiveSplitter;
use crate::embeddings::EmbeddingProvider;
use crate::extract::load_documents;
use crate::index::{ChunkRecord, VectorIndex};
use crate::types::RagError;

/// Immutable view of the most recently published index build.
#[derive(Clone)]
pub struct IndexSnapshot {
    /// Monotonic rebuild counter, bumped on every publish.
    pub generation: u64,
    pub index_name: String,
    /// Model id the corpus embeddings were produced with.
    pub embedder_id: String,
    pub chunk_count: usize,
    pub index: Arc<dyn VectorIndex>,
}

/// Read-copy-update cell holding the current [`IndexSnapshot`].
///
/// Readers clone the inner `Arc`; writers build the next snapshot fully
/// before swapping it in. In-flight readers keep the old snapshot alive
/// until they drop it.
pub struct SharedIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl SharedIndex {
    pub fn new(initial: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    pub fn publish(&self, next: IndexSnapshot) {
        *self.current.write() = Arc::new(next);
    }
}

/// Outcome of one rebuild pass, for logs and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub archived: usize,
    pub skipped_files: usize,
}

pub struct IngestionPipeline {
    incoming_dir: PathBuf,
    indexed_dir: PathBuf,
    index_name: String,
    splitter: RecursiveSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    shared: Arc<SharedIndex>,
    build_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        incoming_dir: impl Into<PathBuf>,
        indexed_dir: impl Into<PathBuf>,
        index_name: impl Into<String>,
        splitter: RecursiveSplitter,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let index_name = index_name.into();
        let shared = Arc::new(SharedIndex::new(IndexSnapshot {
            generation: 0,
            index_name: index_name.clone(),
            embedder_id: embedder.model_id().to_string(),
            chunk_count: 0,
            index: index.clone(),
        }));
        Self {
            incoming_dir: incoming_dir.into(),
            indexed_dir: indexed_dir.into(),
            index_name,
            splitter,
            embedder,
            index,
            shared,
            build_lock: Mutex::new(()),
        }
    }

    /// Snapshot cell shared with the query path.
    pub fn shared(&self) -> Arc<SharedIndex> {
        self.shared.clone()
    }

    /// Indexes everything currently in the incoming directory, then
    /// archives the processed files.
    ///
    /// The index is created on first use and accumulates across rebuilds;
    /// archived files are not re-processed, so a rebuild with an empty
    /// incoming directory changes nothing. [`purge`](Self::purge) is the
    /// only destructive operation.
    pub async fn rebuild(&self) -> Result<RebuildReport, RagError> {
        let _guard = self.build_lock.lock().await;
        let started = Instant::now();

        fs::create_dir_all(&self.incoming_dir).await?;
        fs::create_dir_all(&self.indexed_dir).await?;

        let documents = load_documents(&self.incoming_dir).await?;
        let chunks = self.splitter.split_documents(&documents);
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "extracted and chunked incoming documents"
        );

        self.index
            .create_index(&self.index_name, self.embedder.dimension(), false)
            .await?;

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
            let embed_started = Instant::now();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            debug!(
                elapsed_ms = embed_started.elapsed().as_millis() as u64,
                count = embeddings.len(),
                "embedded chunks"
            );
            if embeddings.len() != chunks.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                )));
            }

            let records: Vec<ChunkRecord> = chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| {
                    ChunkRecord::new(
                        Uuid::new_v4().to_string(),
                        chunk.source_id.clone(),
                        chunk.chunk_index,
                        chunk.text.clone(),
                    )
                    .with_embedding(embedding)
                })
                .collect();
            self.index.upsert(&self.index_name, records).await?;
        }

        let (archived, skipped_files) = self.archive_incoming().await?;
        let chunk_count = self.index.count(&self.index_name).await?;

        let previous = self.shared.load();
        self.shared.publish(IndexSnapshot {
            generation: previous.generation + 1,
            index_name: self.index_name.clone(),
            embedder_id: self.embedder.model_id().to_string(),
            chunk_count,
            index: self.index.clone(),
        });

        let report = RebuildReport {
            documents: documents.len(),
            chunks: chunks.len(),
            archived,
            skipped_files,
        };
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?report,
            chunk_count,
            "rebuild complete"
        );
        Ok(report)
    }

    /// Deletes every archived file and force-recreates the index empty.
    /// Irreversible; the route exposing this is deliberately unguarded,
    /// matching the service contract.
    pub async fn purge(&self) -> Result<(), RagError> {
        let _guard = self.build_lock.lock().await;
        warn!(index = %self.index_name, "purging archived documents and recreating the index");

        self.clear_indexed_dir().await?;
        self.index
            .create_index(&self.index_name, self.embedder.dimension(), true)
            .await?;

        let previous = self.shared.load();
        self.shared.publish(IndexSnapshot {
            generation: previous.generation + 1,
            index_name: self.index_name.clone(),
            embedder_id: self.embedder.model_id().to_string(),
            chunk_count: 0,
            index: self.index.clone(),
        });
        Ok(())
    }

    /// File names of everything already archived, sorted.
    pub async fn ingested_files(&self) -> Result<Vec<String>, RagError> {
        if !self.indexed_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.indexed_dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Stores an uploaded file in the incoming directory under a
    /// sanitized name.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, RagError> {
        let name = sanitize_file_name(file_name)?;
        fs::create_dir_all(&self.incoming_dir).await?;
        let path = self.incoming_dir.join(name);
        fs::write(&path, bytes).await?;
        debug!(file = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(path)
    }

    /// Moves processed files from incoming to indexed. A file that fails
    /// to move is logged and skipped; the rest continue.
    async fn archive_incoming(&self) -> Result<(usize, usize), RagError> {
        let mut entries = fs::read_dir(&self.incoming_dir).await?;
        let mut archived = 0usize;
        let mut skipped = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let source = entry.path();
            let target = self.indexed_dir.join(entry.file_name());
            match move_file(&source, &target).await {
                Ok(()) => archived += 1,
                Err(err) => {
                    warn!(file = %source.display(), error = %err, "failed to archive file");
                    skipped += 1;
                }
            }
        }
        Ok((archived, skipped))
    }

    async fn clear_indexed_dir(&self) -> Result<(), RagError> {
        if !self.indexed_dir.exists() {
            return Ok(());
        }
        let mut entries = fs::read_dir(&self.indexed_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let removal = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            if let Err(err) = removal {
                warn!(file = %path.display(), error = %err, "failed to delete archived file");
            }
        }
        Ok(())
    }
}

async fn move_file(source: &Path, target: &Path) -> Result<(), RagError> {
    match fs::rename(source, target).await {
        Ok(()) => Ok(()),
        // rename fails across filesystems; fall back to copy + delete.
        Err(_) => {
            fs::copy(source, target).await?;
            fs::remove_file(source).await?;
            Ok(())
        }
    }
}

/// Reduces a client-supplied name to its final path component so uploads
/// cannot escape the incoming directory.
fn sanitize_file_name(raw: &str) -> Result<&str, RagError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(RagError::InvalidDocument {
            source_id: raw.to_string(),
            reason: "unusable file name".to_string(),
        });
    }
    Ok(name)
}
