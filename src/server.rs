//! HTTP surface: a thin axum layer over the pipeline and the QA engine.
//!
//! Routes and response shapes match the service's original contract,
//! including the plain-text `Empty Query` body on empty questions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::pipeline::IngestionPipeline;
use crate::qa::QaEngine;
use crate::types::RagError;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub qa: Arc<QaEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/purge", get(purge))
        .route("/ingest", get(ingest))
        .route("/get_ingested_files", get(get_ingested_files))
        .route("/get_answer", post(get_answer))
        .route("/upload_doc", post(upload_doc))
        .route("/upload_files", post(upload_files))
        .with_state(state)
}

/// Binds and serves until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), RagError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        if matches!(self, RagError::EmptyQuery) {
            // Legacy plain-text contract for empty queries.
            return (StatusCode::BAD_REQUEST, "Empty Query").into_response();
        }
        let (status, kind) = match &self {
            RagError::IndexNotFound(_) => (StatusCode::NOT_FOUND, "index_not_found"),
            RagError::IndexCreation { .. } => (StatusCode::BAD_GATEWAY, "index_creation"),
            RagError::IndexUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable"),
            RagError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_service"),
            RagError::Completion(_) => (StatusCode::BAD_GATEWAY, "completion_service"),
            RagError::InvalidDocument { .. } => (StatusCode::BAD_REQUEST, "invalid_document"),
            RagError::EmptyQuery => (StatusCode::BAD_REQUEST, "empty_query"),
            RagError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            RagError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "file_io"),
        };
        warn!(kind, error = %self, "request failed");
        (
            status,
            Json(json!({ "error": kind, "message": self.to_string() })),
        )
            .into_response()
    }
}

async fn purge(State(state): State<AppState>) -> Result<Json<Value>, RagError> {
    state.pipeline.purge().await?;
    Ok(Json(json!({ "response": "Success" })))
}

async fn ingest(State(state): State<AppState>) -> Result<Json<Value>, RagError> {
    state.pipeline.rebuild().await?;
    Ok(Json(json!({ "response": "Success" })))
}

async fn get_ingested_files(State(state): State<AppState>) -> Result<Json<Value>, RagError> {
    let files = state.pipeline.ingested_files().await?;
    Ok(Json(json!({ "ingested_files": files })))
}

async fn get_answer(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, RagError> {
    let query = parse_query_body(&body)?;
    let result = state.qa.answer(&query).await?;
    let sources: Vec<Value> = result
        .sources
        .iter()
        .map(|name| json!({ "name": name }))
        .collect();
    Ok(Json(json!({
        "query": query,
        "answer": result.answer,
        "source": sources,
    })))
}

/// The query arrives either as a JSON-encoded string or as raw text.
fn parse_query_body(body: &str) -> Result<String, RagError> {
    let query = match serde_json::from_str::<String>(body) {
        Ok(decoded) => decoded,
        Err(_) => body.to_string(),
    };
    let query = query.trim().to_string();
    if query.is_empty() {
        return Err(RagError::EmptyQuery);
    }
    Ok(query)
}

async fn upload_doc(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut document: Option<(String, Bytes)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "malformed multipart upload");
                return bad_request("No files found");
            }
        };
        if field.name() != Some("document") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").trim().to_string();
        if file_name.is_empty() {
            return bad_request("No file selected!");
        }
        match field.bytes().await {
            Ok(data) => {
                document = Some((file_name, data));
                break;
            }
            Err(err) => {
                warn!(error = %err, "failed to read uploaded document");
                return bad_request("No files found");
            }
        }
    }

    let Some((file_name, data)) = document else {
        return bad_request("No files found");
    };
    if let Err(err) = state.pipeline.save_upload(&file_name, &data).await {
        return err.into_response();
    }
    if let Err(err) = state.pipeline.rebuild().await {
        return err.into_response();
    }
    Json(json!({ "response": "Document uploaded successfully" })).into_response()
}

async fn upload_files(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut seen_field = false;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "malformed multipart upload");
                return bad_request("No files found");
            }
        };
        if field.name() != Some("documents") {
            continue;
        }
        seen_field = true;
        let file_name = field.file_name().unwrap_or("").trim().to_string();
        if file_name.is_empty() {
            // Unnamed entries are skipped, not fatal.
            continue;
        }
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, file = %file_name, "failed to read uploaded file");
                return bad_request("No files found");
            }
        };
        if let Err(err) = state.pipeline.save_upload(&file_name, &data).await {
            return err.into_response();
        }
    }

    if !seen_field {
        return bad_request("No files found");
    }
    if let Err(err) = state.pipeline.rebuild().await {
        return err.into_response();
    }
    Json(json!({ "response": "Files uploaded successfully" })).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "response": message }))).into_response()
}
