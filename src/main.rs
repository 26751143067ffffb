//! Service entry point: wire the remote providers together, index
//! anything already waiting, then serve.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ragserve::chunker::RecursiveSplitter;
use ragserve::completion::OpenAiChat;
use ragserve::config::Settings;
use ragserve::embeddings::OpenAiEmbeddings;
use ragserve::index::RestVectorIndex;
use ragserve::pipeline::IngestionPipeline;
use ragserve::qa::QaEngine;
use ragserve::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = Settings::from_env()?;

    let embedder = Arc::new(OpenAiEmbeddings::new(
        settings.openai_base_url.clone(),
        settings.openai_api_key.clone(),
        settings.embedding_model.clone(),
        settings.embedding_dimension,
    )?);
    let completer = Arc::new(OpenAiChat::new(
        settings.openai_base_url.clone(),
        settings.openai_api_key.clone(),
        settings.completion_model.clone(),
    )?);
    let index = Arc::new(RestVectorIndex::new(
        settings.vector_base_url.clone(),
        settings.vector_api_key.clone(),
    )?);

    let pipeline = Arc::new(IngestionPipeline::new(
        settings.incoming_dir.clone(),
        settings.indexed_dir.clone(),
        settings.index_name.clone(),
        RecursiveSplitter::new(settings.chunk_size, settings.chunk_overlap),
        embedder.clone(),
        index,
    ));

    // Index whatever is already waiting before accepting traffic.
    pipeline.rebuild().await?;

    let qa = Arc::new(QaEngine::new(
        embedder,
        completer,
        pipeline.shared(),
        settings.top_k,
    ));

    server::serve(AppState { pipeline, qa }, settings.bind_addr).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
