//! Wire-level tests for the REST vector index adapter against a mock
//! HTTP service.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use ragserve::RetryPolicy;
use ragserve::index::{ChunkRecord, RestVectorIndex, VectorIndex};
use ragserve::types::RagError;

fn adapter_for(server: &MockServer) -> RestVectorIndex {
    RestVectorIndex::new(Url::parse(&server.base_url()).unwrap(), None)
        .unwrap()
        .with_retry_policy(RetryPolicy::none())
        .with_create_timeout(Duration::from_millis(100), Duration::from_millis(10))
}

#[tokio::test]
async fn create_keeps_an_existing_index_without_force() {
    let server = MockServer::start_async().await;
    let describe = server
        .mock_async(|when, then| {
            when.method(GET).path("/indexes/docs");
            then.status(200)
                .json_body(json!({ "name": "docs", "ready": true }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/indexes");
            then.status(201);
        })
        .await;

    let index = adapter_for(&server);
    index.create_index("docs", 1536, false).await.unwrap();

    assert_eq!(describe.hits_async().await, 1);
    assert_eq!(create.hits_async().await, 0);
}

#[tokio::test]
async fn force_create_drops_and_recreates() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/indexes/docs");
            then.status(200)
                .json_body(json!({ "name": "docs", "ready": true }));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/indexes/docs");
            then.status(204);
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes")
                .json_body_partial(r#"{ "name": "docs", "dimension": 1536, "metric": "cosine" }"#);
            then.status(201);
        })
        .await;

    let index = adapter_for(&server);
    index.create_index("docs", 1536, true).await.unwrap();

    assert_eq!(delete.hits_async().await, 1);
    assert_eq!(create.hits_async().await, 1);
}

#[tokio::test]
async fn creation_that_never_becomes_ready_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/indexes/docs");
            then.status(404);
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/indexes");
            then.status(201);
        })
        .await;

    let index = adapter_for(&server);
    let err = index.create_index("docs", 1536, false).await.unwrap_err();

    assert!(matches!(err, RagError::IndexCreation { .. }), "got {err:?}");
    assert_eq!(create.hits_async().await, 1);
}

#[tokio::test]
async fn upsert_sends_vectors_with_metadata() {
    let server = MockServer::start_async().await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/vectors")
                .body_contains("\"id\":\"c1\"")
                .body_contains("faq.txt");
            then.status(200).json_body(json!({ "upserted": 1 }));
        })
        .await;

    let index = adapter_for(&server);
    let records = vec![
        ChunkRecord::new("c1", "faq.txt", 0, "refund text").with_embedding(vec![0.1, 0.2]),
        // No embedding: must be skipped client-side.
        ChunkRecord::new("c2", "faq.txt", 1, "tail text"),
    ];
    index.upsert("docs", records).await.unwrap();

    assert_eq!(upsert.hits_async().await, 1);
}

#[tokio::test]
async fn upsert_with_nothing_embeddable_makes_no_request() {
    let server = MockServer::start_async().await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(POST).path("/indexes/docs/vectors");
            then.status(200);
        })
        .await;

    let index = adapter_for(&server);
    index
        .upsert("docs", vec![ChunkRecord::new("c1", "faq.txt", 0, "text")])
        .await
        .unwrap();

    assert_eq!(upsert.hits_async().await, 0);
}

#[tokio::test]
async fn search_parses_matches_into_records() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/query")
                .json_body_partial(r#"{ "top_k": 2, "include_metadata": true }"#);
            then.status(200).json_body(json!({
                "matches": [
                    {
                        "id": "c1",
                        "score": 0.93,
                        "metadata": {
                            "source_id": "faq.txt",
                            "chunk_index": 0,
                            "content": "Refunds are processed within 5 days."
                        }
                    },
                    {
                        "id": "c2",
                        "score": 0.41,
                        "metadata": {
                            "source_id": "terms.txt",
                            "chunk_index": 3,
                            "content": "Contract terms."
                        }
                    }
                ]
            }));
        })
        .await;

    let index = adapter_for(&server);
    let hits = index.search("docs", &[0.1, 0.2], 2).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0.id, "c1");
    assert_eq!(hits[0].0.source_id, "faq.txt");
    assert!(hits[0].0.content.contains("5 days"));
    assert!((hits[0].1 - 0.93).abs() < f32::EPSILON);
    assert_eq!(hits[1].0.chunk_index, 3);
}

#[tokio::test]
async fn search_against_a_missing_index_is_unavailable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/indexes/ghost/query");
            then.status(404);
        })
        .await;

    let index = adapter_for(&server);
    let err = index.search("ghost", &[0.1], 2).await.unwrap_err();
    assert!(matches!(err, RagError::IndexUnavailable(_)));
}

#[tokio::test]
async fn count_reads_the_stats_endpoint() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/indexes/docs/stats");
            then.status(200).json_body(json!({ "vector_count": 7 }));
        })
        .await;

    let index = adapter_for(&server);
    assert_eq!(index.count("docs").await.unwrap(), 7);
}

#[tokio::test]
async fn dropping_an_absent_index_is_a_typed_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/indexes/ghost");
            then.status(404);
        })
        .await;

    let index = adapter_for(&server);
    let err = index.drop_index("ghost").await.unwrap_err();
    assert!(matches!(err, RagError::IndexNotFound(_)));
}

#[tokio::test]
async fn transient_server_errors_are_retried_before_surfacing() {
    let server = MockServer::start_async().await;
    let stats = server
        .mock_async(|when, then| {
            when.method(GET).path("/indexes/docs/stats");
            then.status(500).body("vector service down");
        })
        .await;

    let index = RestVectorIndex::new(Url::parse(&server.base_url()).unwrap(), None)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(5),
        });
    let err = index.count("docs").await.unwrap_err();

    assert!(matches!(err, RagError::IndexUnavailable(_)));
    assert_eq!(stats.hits_async().await, 3);
}

#[tokio::test]
async fn api_key_header_is_attached_when_configured() {
    let server = MockServer::start_async().await;
    let describe = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/indexes/docs")
                .header("api-key", "secret-key");
            then.status(200)
                .json_body(json!({ "name": "docs", "ready": true }));
        })
        .await;

    let index = RestVectorIndex::new(
        Url::parse(&server.base_url()).unwrap(),
        Some("secret-key".to_string()),
    )
    .unwrap()
    .with_retry_policy(RetryPolicy::none());
    assert!(index.has_index("docs").await.unwrap());

    assert_eq!(describe.hits_async().await, 1);
}
