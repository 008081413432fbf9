//! Size-based choice between inline and resumable uploads.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

use reel_models::RemoteFileHandle;

use crate::client::GeminiClient;
use crate::error::GeminiResult;
use crate::transfer::TransferOrchestrator;

/// Video content ready to be referenced by an analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPayload {
    /// Bytes embedded in the request
    Inline {
        mime_type: String,
        data_base64: String,
    },
    /// A file already uploaded and active on the service
    Remote(RemoteFileHandle),
}

impl VideoPayload {
    pub fn mime_type(&self) -> &str {
        match self {
            VideoPayload::Inline { mime_type, .. } => mime_type,
            VideoPayload::Remote(handle) => &handle.mime_type,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, VideoPayload::Inline { .. })
    }
}

/// Video MIME type from a file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mpeg") | Some("mpg") => "video/mpeg",
        _ => "video/mp4",
    }
}

/// Prepares local videos for analysis.
#[derive(Clone)]
pub struct Uploader {
    client: GeminiClient,
}

impl Uploader {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Inline files below the configured threshold, upload the rest.
    pub async fn prepare(&self, path: impl AsRef<Path>) -> GeminiResult<VideoPayload> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path).await?.len();
        let mime_type = mime_type_for(path);
        let threshold = self.client.config().inline_threshold_bytes;

        if size < threshold {
            debug!(path = %path.display(), size, threshold, "Sending video inline");
            let bytes = tokio::fs::read(path).await?;
            return Ok(VideoPayload::Inline {
                mime_type: mime_type.to_string(),
                data_base64: STANDARD.encode(bytes),
            });
        }

        info!(path = %path.display(), size, threshold, "Video exceeds inline limit, uploading");
        let mut transfer = TransferOrchestrator::new(self.client.clone());
        let handle = transfer.upload(path, mime_type).await?;
        Ok(VideoPayload::Remote(handle))
    }
}
