//! Veo video generation.
//!
//! Submission returns a long-running operation that is polled until done. The
//! finished operation carries a locator that is downloaded exactly once.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reel_models::AspectRatio;

use crate::client::{error_body, GeminiClient};
use crate::error::{GeminiError, GeminiResult};
use crate::poll::{poll_until, PollStatus};
use crate::retry::with_retry;

const RESOLUTION: &str = "720p";

/// Still image used as the first frame of a generated clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ReferenceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Load an image, taking the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> GeminiResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let mime_type = match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => {
                return Err(GeminiError::config(format!(
                    "Unsupported reference image: {}",
                    path.display()
                )))
            }
        };

        Ok(Self::new(tokio::fs::read(path).await?, mime_type))
    }
}

/// Parameters for one clip.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: Option<ReferenceImage>,
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            aspect_ratio,
        }
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }
}

/// Downloaded clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImageInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageInput {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    aspect_ratio: &'static str,
    resolution: &'static str,
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoLocator>,
}

#[derive(Debug, Deserialize)]
struct VideoLocator {
    uri: Option<String>,
}

impl Operation {
    /// Locator of the first sample of a finished operation.
    fn into_locator(self) -> GeminiResult<String> {
        if let Some(error) = self.error {
            return Err(GeminiError::generation(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        let response = self
            .response
            .and_then(|r| r.generate_video_response)
            .ok_or_else(|| GeminiError::generation("operation finished without a video"))?;

        if !response.rai_media_filtered_reasons.is_empty() {
            return Err(GeminiError::generation(format!(
                "blocked by safety filters: {}",
                response.rai_media_filtered_reasons.join("; ")
            )));
        }

        response
            .generated_samples
            .into_iter()
            .find_map(|s| s.video.and_then(|v| v.uri))
            .ok_or_else(|| GeminiError::generation("operation finished without a video"))
    }
}

/// Generates clips with the configured video model.
#[derive(Clone)]
pub struct GenerationClient {
    client: GeminiClient,
}

impl GenerationClient {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Generate one clip and download it into `dest_dir`.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        dest_dir: impl AsRef<Path>,
    ) -> GeminiResult<GeneratedVideo> {
        let operation = self.submit(request).await?;
        info!(operation = %operation, aspect = %request.aspect_ratio, "Video generation submitted");

        let locator = self.wait_for(&operation).await?;

        let dest = dest_dir.as_ref().join(format!("{}.mp4", Uuid::new_v4()));
        let bytes = self.download(&locator, &dest).await?;

        info!(operation = %operation, path = %dest.display(), bytes, "Generated video downloaded");
        Ok(GeneratedVideo { path: dest, bytes })
    }

    async fn submit(&self, request: &GenerationRequest) -> GeminiResult<String> {
        let config = self.client.config();
        let url = self
            .client
            .endpoint(&format!("v1beta/models/{}:predictLongRunning", config.video_model))?;

        let body = PredictRequest {
            instances: vec![Instance {
                prompt: &request.prompt,
                image: request.reference_image.as_ref().map(|image| ImageInput {
                    bytes_base64_encoded: STANDARD.encode(&image.bytes),
                    mime_type: image.mime_type.clone(),
                }),
            }],
            parameters: Parameters {
                aspect_ratio: request.aspect_ratio.as_str(),
                resolution: RESOLUTION,
                sample_count: 1,
            },
        };

        let response = self
            .client
            .execute("generate_video", self.client.http().post(url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::from_http_status(
                status.as_u16(),
                error_body(response).await,
            ));
        }

        let operation: Operation = response.json().await?;
        Ok(operation.name)
    }

    async fn wait_for(&self, operation: &str) -> GeminiResult<String> {
        let config = self.client.config();
        let what = format!("operation {}", operation);
        let path = format!("v1beta/{}", operation);

        poll_until(&config.operation_poll, "operation_status", &what, |attempt| {
            let path = path.clone();
            async move {
                let op = with_retry(&config.retry, "operation_status", || {
                    self.fetch_operation(&path)
                })
                .await?;
                debug!(operation = %op.name, done = op.done, attempt, "Operation status");

                if op.done {
                    op.into_locator().map(PollStatus::Ready)
                } else {
                    Ok(PollStatus::Pending)
                }
            }
        })
        .await
    }

    async fn fetch_operation(&self, path: &str) -> GeminiResult<Operation> {
        let url = self.client.endpoint(path)?;
        let response = self
            .client
            .execute("operation_status", self.client.http().get(url))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::from_http_status(
                status.as_u16(),
                error_body(response).await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Stream the locator to `dest`, removing the partial file on failure.
    async fn download(&self, locator: &str, dest: &Path) -> GeminiResult<u64> {
        let url = self.client.authenticate(locator)?;
        let retry = &self.client.config().retry;

        let result = with_retry(retry, "download_video", || self.download_once(url.clone(), dest)).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %dest.display(), "Failed to remove partial download: {}", e);
                }
            }
        }
        result
    }

    async fn download_once(&self, url: url::Url, dest: &Path) -> GeminiResult<u64> {
        let response = self
            .client
            .execute("download_video", self.client.http().get(url))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Download {
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(bytes)
    }
}
