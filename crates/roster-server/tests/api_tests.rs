//! API integration tests for the Roster server
//!
//! The router runs against an in-memory store, so these tests need no
//! database.
//!
//! Coverage includes:
//! - CSV upload success, duplicates and failure envelopes
//! - Validation errors (missing file, bad limit, oversized upload)
//! - Record listing order and limits
//! - Temp file cleanup after every upload

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use roster_ingest::{MemoryStore, Record, RecordStore};
use roster_server::{api::create_router, config::Config};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "roster-test-boundary";

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_app(store: Arc<dyn RecordStore>, upload_dir: &Path) -> Router {
    let mut config = Config::default();
    config.upload.dir = upload_dir.to_path_buf();
    config.ingest = config.ingest.with_batch_size(2);
    create_router(store, &config)
}

/// Build a multipart body with a single field
fn multipart_body(field: &str, filename: &str, contents: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\
         \r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    )
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Helper to send a GET request
async fn get_request(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

/// Helper to POST a multipart body to the upload endpoint
async fn upload(app: &Router, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/records/upload")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

const PEOPLE: &str = "id,firstname,lastname,email,email2,profession\n\
                      1,Ann,Archer,ann@example.com,,Pilot\n\
                      2,Bob,Baker,bob@example.com,,Baker\n\
                      2,Bob,Again,bob2@example.com,,Baker\n\
                      3,Cy,Cole,cy@example.com,cy@work.example,Clerk\n";

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let app = create_test_app(store.clone(), dir.path());

    let (status, body) = upload(&app, multipart_body("file", "people.csv", PEOPLE)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["recordsProcessed"], 3);
    assert_eq!(body["data"]["linesProcessed"], 4);
    assert_eq!(body["data"]["message"], "File processed successfully");
    assert_eq!(store.len(), 3);
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::new(MemoryStore::new()), dir.path());

    let (status, body) = upload(&app, multipart_body("document", "people.csv", PEOPLE)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_upload_that_is_not_multipart() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::new(MemoryStore::new()), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/records/upload")
                .method("POST")
                .header("content-type", "text/csv")
                .body(Body::from(PEOPLE))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_upload_store_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::failing_after(1));
    let app = create_test_app(store, dir.path());

    let (status, body) = upload(&app, multipart_body("file", "people.csv", PEOPLE)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INGESTION_FAILED");
    assert_eq!(body["error"]["details"]["cause"], "insert");
    assert_eq!(body["error"]["details"]["recordsProcessed"], 2);
    assert_eq!(body["error"]["details"]["linesProcessed"], 4);
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_upload_over_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.upload.dir = dir.path().to_path_buf();
    config.upload.max_bytes = 16;
    let store = Arc::new(MemoryStore::new());
    let app = create_router(store.clone(), &config);

    let (status, body) = upload(&app, multipart_body("file", "people.csv", PEOPLE)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(store.insert_calls(), 0);
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_same_file_twice() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let app = create_test_app(store.clone(), dir.path());

    upload(&app, multipart_body("file", "people.csv", PEOPLE)).await;
    let (status, body) = upload(&app, multipart_body("file", "people.csv", PEOPLE)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recordsProcessed"], 0);
    assert_eq!(body["data"]["linesProcessed"], 4);
    assert_eq!(store.len(), 3);
}

// ============================================================================
// Listing
// ============================================================================

fn seeded_store(n: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.seed((1..=n).map(|id| Record {
        id,
        firstname: format!("P{id}"),
        ..Record::default()
    }));
    store
}

#[tokio::test]
async fn test_list_defaults_to_ten_newest() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(seeded_store(15), dir.path());

    let (status, body) = get_request(&app, "/api/v1/records").await;

    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["id"], 15);
    assert_eq!(items[0]["firstname"], "P15");
    assert_eq!(body["meta"]["limit"], 10);
}

#[tokio::test]
async fn test_list_with_limit() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(seeded_store(15), dir.path());

    let (status, body) = get_request(&app, "/api/v1/records?limit=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["meta"]["count"], 3);
}

#[tokio::test]
async fn test_list_limit_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(seeded_store(1), dir.path());

    for uri in ["/api/v1/records?limit=0", "/api/v1/records?limit=101"] {
        let (status, body) = get_request(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::new(MemoryStore::new()), dir.path());

    let (status, body) = get_request(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
