//! Generation client tests against mock Veo endpoints.

use std::time::Duration;

use reel_gemini::{
    GeminiClient, GeminiConfig, GeminiError, GenerationClient, GenerationRequest, PollPolicy,
    ReferenceImage, RetryConfig,
};
use reel_models::AspectRatio;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBMIT: &str = "/v1beta/models/veo-test:predictLongRunning";
const OPERATION: &str = "/v1beta/models/veo-test/operations/op-1";
const DOWNLOAD: &str = "/v1beta/files/video-1:download";

fn generation_client(server: &MockServer, max_polls: u32) -> GenerationClient {
    let mut config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_operation_poll(PollPolicy::new(Duration::from_millis(5), max_polls))
        .with_retry(RetryConfig::none());
    config.video_model = "veo-test".to_string();
    GenerationClient::new(GeminiClient::new(config).unwrap())
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SUBMIT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "models/veo-test/operations/op-1"})),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn done_operation(server: &MockServer) -> serde_json::Value {
    json!({
        "name": "models/veo-test/operations/op-1",
        "done": true,
        "response": {"generateVideoResponse": {"generatedSamples": [
            {"video": {"uri": format!("{}{}?alt=media", server.uri(), DOWNLOAD)}}
        ]}}
    })
}

#[tokio::test]
async fn test_n_polls_then_single_download() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "models/veo-test/operations/op-1", "done": false})),
        )
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_operation(&server)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .and(query_param("alt", "media"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 2048]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("a paper boat on a puddle", AspectRatio::Portrait9x16);
    let video = generation_client(&server, 10)
        .generate(&request, dir.path())
        .await
        .unwrap();

    assert_eq!(video.bytes, 2048);
    assert_eq!(video.path.parent(), Some(dir.path()));
    assert_eq!(video.path.extension().and_then(|e| e.to_str()), Some("mp4"));
    assert_eq!(tokio::fs::metadata(&video.path).await.unwrap().len(), 2048);
}

#[tokio::test]
async fn test_request_carries_prompt_image_and_aspect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT))
        .and(body_partial_json(json!({
            "instances": [{
                "prompt": "a paper boat",
                "image": {"bytesBase64Encoded": "AQID", "mimeType": "image/png"}
            }],
            "parameters": {"aspectRatio": "16:9", "resolution": "720p", "sampleCount": 1}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "models/veo-test/operations/op-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_operation(&server)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 8]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("a paper boat", AspectRatio::Landscape16x9)
        .with_reference_image(ReferenceImage::new(vec![1, 2, 3], "image/png"));

    let video = generation_client(&server, 5)
        .generate(&request, dir.path())
        .await
        .unwrap();
    assert_eq!(video.bytes, 8);
}

#[tokio::test]
async fn test_operation_error_is_generation_error() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-test/operations/op-1",
            "done": true,
            "error": {"code": 3, "message": "Prompt violates usage guidelines"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("anything", AspectRatio::Landscape16x9);
    let err = generation_client(&server, 5)
        .generate(&request, dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::Generation { ref message } if message.contains("usage guidelines")));
}

#[tokio::test]
async fn test_operation_never_done_times_out() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "models/veo-test/operations/op-1", "done": false})),
        )
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("anything", AspectRatio::Landscape16x9);
    let err = generation_client(&server, 4)
        .generate(&request, dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::PollTimeout { attempts: 4, .. }));
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_operation(&server)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("anything", AspectRatio::Landscape16x9);
    let err = generation_client(&server, 5)
        .generate(&request, dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::Download { status: 403 }));
    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}
