//! Upload path tests against a mock Files API.

use std::time::Duration;

use reel_gemini::{
    GeminiClient, GeminiConfig, GeminiError, PollPolicy, RetryConfig, TransferOrchestrator,
    TransferState, Uploader, VideoPayload,
};
use reel_models::FileState;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, threshold: u64) -> GeminiClient {
    let config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_inline_threshold(threshold)
        .with_poll_interval(Duration::from_millis(5))
        .with_retry(RetryConfig::none());
    GeminiClient::new(config).unwrap()
}

async fn video_file(dir: &tempfile::TempDir, bytes: usize) -> std::path::PathBuf {
    let path = dir.path().join("reference.mp4");
    tokio::fs::write(&path, vec![7u8; bytes]).await.unwrap();
    path
}

fn file_json(state: &str) -> serde_json::Value {
    json!({
        "name": "files/abc123",
        "uri": "https://files.example.com/v1beta/files/abc123",
        "mimeType": "video/mp4",
        "state": state
    })
}

async fn mount_initiate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("X-Goog-Upload-Command", "start"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-goog-upload-url", format!("{}/resumable/session-1?upload_id=xyz", server.uri()).as_str()),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_transfer(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/resumable/session-1"))
        .and(query_param("upload_id", "xyz"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file": file_json("PROCESSING")})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_small_file_never_touches_upload_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 16).await;

    let payload = Uploader::new(client(&server, 1024)).prepare(&file).await.unwrap();
    assert!(payload.is_inline());
    assert_eq!(payload.mime_type(), "video/mp4");
}

#[tokio::test]
async fn test_large_file_initiates_transfers_then_polls() {
    let server = MockServer::start().await;
    mount_initiate(&server).await;
    mount_transfer(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("PROCESSING")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let payload = Uploader::new(client(&server, 32)).prepare(&file).await.unwrap();
    match payload {
        VideoPayload::Remote(handle) => {
            assert_eq!(handle.name, "files/abc123");
            assert_eq!(handle.state, FileState::Active);
        }
        other => panic!("expected remote payload, got {:?}", other),
    }

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "/upload/v1beta/files",
            "/resumable/session-1",
            "/v1beta/files/abc123",
            "/v1beta/files/abc123",
            "/v1beta/files/abc123",
        ]
    );
    assert_eq!(requests[1].body.len(), 64);
}

#[tokio::test]
async fn test_file_stuck_processing_times_out() {
    let server = MockServer::start().await;
    mount_initiate(&server).await;
    mount_transfer(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("PROCESSING")))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let client = GeminiClient::new(
        client(&server, 32)
            .config()
            .clone()
            .with_file_poll(PollPolicy::new(Duration::from_millis(5), 3)),
    )
    .unwrap();

    let mut transfer = TransferOrchestrator::new(client);
    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();

    assert!(matches!(err, GeminiError::PollTimeout { attempts: 3, .. }));
    assert_eq!(transfer.state(), TransferState::Failed);
}

#[tokio::test]
async fn test_failed_processing_is_reported() {
    let server = MockServer::start().await;
    mount_initiate(&server).await;
    mount_transfer(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("FAILED")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let mut transfer = TransferOrchestrator::new(client(&server, 32));
    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();
    assert!(matches!(err, GeminiError::FileProcessingFailed { ref name } if name == "files/abc123"));
}

#[tokio::test]
async fn test_initiation_failure_surfaces_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let mut transfer = TransferOrchestrator::new(client(&server, 32));
    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();

    match err {
        GeminiError::Initiation { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("API key not valid"));
        }
        other => panic!("expected initiation error, got {:?}", other),
    }
    assert_eq!(transfer.state(), TransferState::Failed);
}

#[tokio::test]
async fn test_missing_upload_location_is_initiation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let mut transfer = TransferOrchestrator::new(client(&server, 32));
    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();
    assert!(matches!(err, GeminiError::Initiation { ref body, .. } if body.contains("x-goog-upload-url")));
}

#[tokio::test]
async fn test_transfer_failure_surfaces_body_without_polling() {
    let server = MockServer::start().await;
    mount_initiate(&server).await;

    Mock::given(method("POST"))
        .and(path("/resumable/session-1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("offset mismatch"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let mut transfer = TransferOrchestrator::new(client(&server, 32));
    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();
    assert!(matches!(err, GeminiError::Transfer { status: 400, ref body } if body.contains("offset mismatch")));
}

#[tokio::test]
async fn test_orchestrator_is_single_use() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let mut transfer = TransferOrchestrator::new(client(&server, 32));
    assert!(transfer.upload(&file, "video/mp4").await.is_err());

    let err = transfer.upload(&file, "video/mp4").await.unwrap_err();
    assert!(matches!(err, GeminiError::Config(_)));
}

#[tokio::test]
async fn test_transient_status_failure_is_retried_without_using_a_poll() {
    let server = MockServer::start().await;
    mount_initiate(&server).await;
    mount_transfer(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("PROCESSING")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
        .expect(1)
        .mount(&server)
        .await;

    let config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_inline_threshold(32)
        .with_file_poll(PollPolicy::new(Duration::from_millis(5), 2))
        .with_retry(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        });
    let client = GeminiClient::new(config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = video_file(&dir, 64).await;

    let payload = Uploader::new(client).prepare(&file).await.unwrap();
    assert!(matches!(payload, VideoPayload::Remote(ref h) if h.state == FileState::Active));

    let status_gets = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/v1beta/files/abc123")
        .count();
    assert_eq!(status_gets, 3);
}
