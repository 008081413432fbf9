//! Resumable two-phase upload to the Files API.
//!
//! The orchestrator walks a fixed sequence:
//!
//! ```text
//! Idle -> Initiating -> Transferring -> Polling -> Active
//!                 \            \           \
//!                  +------------+-----------+--> Failed
//! ```
//!
//! Each phase runs exactly once and strictly after the previous one. The whole
//! body is sent in a single finalizing write; resuming a broken transfer from an
//! offset is not supported yet.

use std::fmt;
use std::path::Path;

use reqwest::header::CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reel_models::{FileState, RemoteFileHandle};

use crate::client::{error_body, GeminiClient};
use crate::error::{GeminiError, GeminiResult};
use crate::poll::{poll_until, PollStatus};
use crate::retry::with_retry;

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Phase of a resumable upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Initiating,
    Transferring,
    Polling,
    Active,
    Failed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::Initiating => "initiating",
            TransferState::Transferring => "transferring",
            TransferState::Polling => "polling",
            TransferState::Active => "active",
            TransferState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Active | TransferState::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    file: StartFile<'a>,
}

#[derive(Debug, Serialize)]
struct StartFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    file: RemoteFileHandle,
}

/// Drives one resumable upload.
///
/// An orchestrator is single-use: once it reaches a terminal state it refuses
/// to start again.
pub struct TransferOrchestrator {
    client: GeminiClient,
    state: TransferState,
}

impl TransferOrchestrator {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            state: TransferState::Idle,
        }
    }

    /// Current phase.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Upload a file and wait until the service reports it active.
    pub async fn upload(
        &mut self,
        path: impl AsRef<Path>,
        mime_type: &str,
    ) -> GeminiResult<RemoteFileHandle> {
        if self.state != TransferState::Idle {
            return Err(GeminiError::config(format!(
                "Transfer already ran (state: {})",
                self.state
            )));
        }

        let result = self.run(path.as_ref(), mime_type).await;
        match &result {
            Ok(handle) => {
                self.transition(TransferState::Active);
                info!(file = %handle.name, uri = %handle.uri, "Remote file is active");
            }
            Err(e) => {
                self.transition(TransferState::Failed);
                warn!("Resumable upload failed: {}", e);
            }
        }
        result
    }

    async fn run(&mut self, path: &Path, mime_type: &str) -> GeminiResult<RemoteFileHandle> {
        let size = tokio::fs::metadata(path).await?.len();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        self.transition(TransferState::Initiating);
        let location = self.initiate(size, mime_type, &display_name).await?;

        self.transition(TransferState::Transferring);
        let uploaded = self.transfer(&location, path, size).await?;

        self.transition(TransferState::Polling);
        self.wait_until_active(uploaded).await
    }

    fn transition(&mut self, next: TransferState) {
        debug!(from = %self.state, to = %next, "Transfer state change");
        self.state = next;
    }

    /// Declare the upload and obtain the single-use upload location.
    async fn initiate(&self, size: u64, mime_type: &str, display_name: &str) -> GeminiResult<String> {
        let url = self.client.endpoint("upload/v1beta/files")?;
        let request = self
            .client
            .http()
            .post(url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartRequest {
                file: StartFile { display_name },
            });

        let response = self.client.execute("upload_initiate", request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Initiation {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let location = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match location {
            Some(location) => {
                debug!(size, mime_type, "Upload initiated");
                Ok(location)
            }
            None => Err(GeminiError::Initiation {
                status: status.as_u16(),
                body: format!(
                    "missing {} header: {}",
                    UPLOAD_URL_HEADER,
                    error_body(response).await
                ),
            }),
        }
    }

    /// Send the whole body in one finalizing write.
    async fn transfer(&self, location: &str, path: &Path, size: u64) -> GeminiResult<RemoteFileHandle> {
        let file = tokio::fs::File::open(path).await?;
        let url = self.client.authenticate(location)?;

        let request = self
            .client
            .http()
            .post(url)
            .header(CONTENT_LENGTH, size)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(file);

        let response = self.client.execute("upload_transfer", request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Transfer {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let finalized: FinalizeResponse = response.json().await.map_err(|e| GeminiError::Transfer {
            status: status.as_u16(),
            body: format!("unreadable upload response: {}", e),
        })?;

        info!(file = %finalized.file.name, bytes = size, "Upload transferred");
        Ok(finalized.file)
    }

    /// Poll the file until it leaves processing.
    async fn wait_until_active(&self, uploaded: RemoteFileHandle) -> GeminiResult<RemoteFileHandle> {
        let policy = self.client.config().file_poll;
        let retry = &self.client.config().retry;
        let what = format!("file {}", uploaded.name);
        let path = format!("v1beta/{}", uploaded.name);

        poll_until(&policy, "file_status", &what, |attempt| {
            let path = path.clone();
            async move {
                let handle = with_retry(retry, "file_status", || self.fetch_status(&path)).await?;
                debug!(file = %handle.name, state = %handle.state, attempt, "File status");

                match handle.state {
                    FileState::Active => Ok(PollStatus::Ready(handle)),
                    FileState::Failed => Err(GeminiError::FileProcessingFailed { name: handle.name }),
                    _ => Ok(PollStatus::Pending),
                }
            }
        })
        .await
    }

    async fn fetch_status(&self, path: &str) -> GeminiResult<RemoteFileHandle> {
        let url = self.client.endpoint(path)?;
        let response = self
            .client
            .execute("file_status", self.client.http().get(url))
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
}
