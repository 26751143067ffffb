//! Environment-driven runtime settings.
//!
//! The binary loads a `.env` file via `dotenvy` before calling
//! [`Settings::from_env`]; every knob has a default except the credentials
//! and the vector service address.

use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

use crate::types::RagError;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;
/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 2;
/// Default embedding dimension, matching `text-embedding-ada-002`.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Fully resolved runtime configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Directory watched for freshly uploaded documents.
    pub incoming_dir: PathBuf,
    /// Directory holding documents that have been indexed.
    pub indexed_dir: PathBuf,
    /// Name of the remote vector collection.
    pub index_name: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: Url,
    pub openai_api_key: String,
    /// Base URL of the vector index service.
    pub vector_base_url: Url,
    pub vector_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub completion_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary lookup, which keeps the parsing
    /// logic testable without mutating process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RagError> {
        let incoming_dir = lookup("DOCUMENT_DIRECTORY")
            .unwrap_or_else(|| "data/incoming".to_string())
            .into();
        let indexed_dir = lookup("DOCUMENT_DIRECTORY_INDEXED")
            .unwrap_or_else(|| "data/indexed".to_string())
            .into();
        let index_name = lookup("VECTOR_INDEX").unwrap_or_else(|| "documents".to_string());

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5555".to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|err| RagError::Config(format!("invalid BIND_ADDR '{bind_addr}': {err}")))?;

        let openai_base_url = parse_url(
            "OPENAI_BASE_URL",
            lookup("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        )?;
        let openai_api_key = lookup("OPENAI_API_KEY")
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let vector_base_url = lookup("VECTOR_SERVICE_URL")
            .ok_or_else(|| RagError::Config("VECTOR_SERVICE_URL is not set".to_string()))?;
        let vector_base_url = parse_url("VECTOR_SERVICE_URL", vector_base_url)?;
        let vector_api_key = lookup("VECTOR_SERVICE_API_KEY");

        let embedding_model =
            lookup("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-ada-002".to_string());
        let embedding_dimension = parse_usize(
            "EMBEDDING_DIMENSION",
            lookup("EMBEDDING_DIMENSION"),
            DEFAULT_EMBEDDING_DIMENSION,
        )?;
        let completion_model =
            lookup("COMPLETION_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string());

        let chunk_size = parse_usize("CHUNK_SIZE", lookup("CHUNK_SIZE"), DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_usize(
            "CHUNK_OVERLAP",
            lookup("CHUNK_OVERLAP"),
            DEFAULT_CHUNK_OVERLAP,
        )?;
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})"
            )));
        }
        let top_k = parse_usize("TOP_K", lookup("TOP_K"), DEFAULT_TOP_K)?;

        Ok(Self {
            incoming_dir,
            indexed_dir,
            index_name,
            bind_addr,
            openai_base_url,
            openai_api_key,
            vector_base_url,
            vector_api_key,
            embedding_model,
            embedding_dimension,
            completion_model,
            chunk_size,
            chunk_overlap,
            top_k,
        })
    }
}

fn parse_url(key: &str, raw: String) -> Result<Url, RagError> {
    Url::parse(&raw).map_err(|err| RagError::Config(format!("invalid {key} '{raw}': {err}")))
}

fn parse_usize(key: &str, raw: Option<String>, default: usize) -> Result<usize, RagError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|err| RagError::Config(format!("invalid {key} '{value}': {err}"))),
    }
}
