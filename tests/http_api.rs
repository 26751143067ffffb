//! HTTP surface tests: each case drives a real listener with reqwest.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::{TempDir, tempdir};

use ragserve::chunker::RecursiveSplitter;
use ragserve::completion::MockCompletionProvider;
use ragserve::embeddings::MockEmbeddingProvider;
use ragserve::index::MemoryVectorIndex;
use ragserve::pipeline::IngestionPipeline;
use ragserve::qa::QaEngine;
use ragserve::server::{AppState, router};

struct TestServer {
    base_url: String,
    embedder: Arc<MockEmbeddingProvider>,
    _dir: TempDir,
}

async fn spawn_app() -> TestServer {
    let dir = tempdir().unwrap();
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let index = Arc::new(MemoryVectorIndex::new());
    let pipeline = Arc::new(IngestionPipeline::new(
        dir.path().join("incoming"),
        dir.path().join("indexed"),
        "docs",
        RecursiveSplitter::new(200, 20),
        embedder.clone(),
        index,
    ));
    let qa = Arc::new(QaEngine::new(
        embedder.clone(),
        Arc::new(MockCompletionProvider::echo()),
        pipeline.shared(),
        2,
    ));
    let app = router(AppState { pipeline, qa });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            eprintln!("test server error: {err}");
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        embedder,
        _dir: dir,
    }
}

fn upload_form(field: &str, file_name: &str, content: &str) -> Form {
    Form::new().part(
        field.to_string(),
        Part::text(content.to_string()).file_name(file_name.to_string()),
    )
}

#[tokio::test]
async fn ingested_files_start_empty() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/get_ingested_files", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["ingested_files"], serde_json::json!([]));
}

#[tokio::test]
async fn empty_query_is_rejected_without_touching_remote_services() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/get_answer", server.base_url))
        .body("")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "Empty Query");
    assert_eq!(server.embedder.calls(), 0, "no embedding call may happen");
}

#[tokio::test]
async fn upload_then_ask_returns_answer_with_sources() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload_doc", server.base_url))
        .multipart(upload_form(
            "document",
            "faq.txt",
            "Refunds are processed within 5 days.",
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "Document uploaded successfully");

    let files: Value = client
        .get(format!("{}/get_ingested_files", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files["ingested_files"], serde_json::json!(["faq.txt"]));

    let response = client
        .post(format!("{}/get_answer", server.base_url))
        .body("\"How long do refunds take?\"")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["query"], "How long do refunds take?");
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("5 days"), "unexpected answer: {answer}");
    assert_eq!(body["source"], serde_json::json!([{ "name": "faq.txt" }]));
}

#[tokio::test]
async fn upload_without_a_document_field_is_rejected() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload_doc", server.base_url))
        .multipart(Form::new().text("unrelated", "value"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "No files found");

    // Nothing was ingested.
    let files: Value = client
        .get(format!("{}/get_ingested_files", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files["ingested_files"], serde_json::json!([]));
}

#[tokio::test]
async fn upload_with_empty_file_name_is_rejected() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload_doc", server.base_url))
        .multipart(Form::new().part(
            "document",
            Part::text("content without a name").file_name(""),
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "No file selected!");
}

#[tokio::test]
async fn upload_files_accepts_several_documents_at_once() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .part(
            "documents",
            Part::text("Shipping takes three days.").file_name("shipping.txt"),
        )
        .part(
            "documents",
            Part::text("Warranty lasts two years.").file_name("warranty.txt"),
        );
    let response = client
        .post(format!("{}/upload_files", server.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "Files uploaded successfully");

    let files: Value = client
        .get(format!("{}/get_ingested_files", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        files["ingested_files"],
        serde_json::json!(["shipping.txt", "warranty.txt"])
    );
}

#[tokio::test]
async fn ingest_endpoint_reports_success() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/ingest", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["response"], "Success");
}

#[tokio::test]
async fn purge_resets_the_service() {
    let server = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/upload_doc", server.base_url))
        .multipart(upload_form("document", "faq.txt", "Some indexed content."))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .get(format!("{}/purge", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["response"], "Success");

    let files: Value = client
        .get(format!("{}/get_ingested_files", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files["ingested_files"], serde_json::json!([]));
}
