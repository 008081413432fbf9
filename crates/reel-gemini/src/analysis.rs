//! Storyboard analysis of a reference video.
//!
//! A single `generateContent` call carries the video (inline or by file
//! reference), a fixed instruction and a response schema. The returned JSON is
//! decoded into an [`AnalysisResult`] and checked for conformance before it is
//! handed back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use reel_models::AnalysisResult;

use crate::client::{error_body, GeminiClient};
use crate::error::{GeminiError, GeminiResult};
use crate::upload::{Uploader, VideoPayload};

/// Instruction sent with every analysis request.
pub const ANALYSIS_INSTRUCTION: &str = r#"You are a film director and storyboard artist.
Watch the attached video and break it down into its distinct scenes, in order.

For the whole video provide:
- "title": a short, evocative title
- "summary": two or three sentences describing what happens

For every scene provide:
- "id": sequential integer starting at 1
- "timeRange": where the scene sits in the video, as "MM:SS - MM:SS"
- "visualDescription": what is visible (subjects, setting, lighting, colour)
- "cameraMovement": the camera work (static, pan, tilt, dolly, handheld, ...)
- "aiImagePrompt": a detailed prompt to recreate the key frame with an image model
- "aiVideoPrompt": a detailed prompt to recreate the shot with a video model, including motion and camera work
- "voiceoverScript": optional narration for the scene

Return ONLY a single JSON object matching the response schema and nothing else."#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn video(payload: &VideoPayload) -> Self {
        match payload {
            VideoPayload::Inline {
                mime_type,
                data_base64,
            } => Self {
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: data_base64.clone(),
                }),
                ..Default::default()
            },
            VideoPayload::Remote(handle) => Self {
                file_data: Some(FileData {
                    mime_type: handle.mime_type.clone(),
                    file_uri: handle.uri.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

/// Response schema in the service's OpenAPI subset.
pub fn response_schema() -> Value {
    let text = json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "title": text,
            "summary": text,
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "INTEGER" },
                        "timeRange": text,
                        "visualDescription": text,
                        "cameraMovement": text,
                        "aiImagePrompt": text,
                        "aiVideoPrompt": text,
                        "voiceoverScript": text
                    },
                    "required": [
                        "id",
                        "timeRange",
                        "visualDescription",
                        "cameraMovement",
                        "aiImagePrompt",
                        "aiVideoPrompt"
                    ]
                }
            }
        },
        "required": ["title", "summary", "scenes"]
    })
}

/// Turns a reference video into a storyboard.
#[derive(Clone)]
pub struct AnalysisClient {
    client: GeminiClient,
    uploader: Uploader,
}

impl AnalysisClient {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            uploader: Uploader::new(client.clone()),
            client,
        }
    }

    /// Analyze a local video file.
    pub async fn analyze(&self, path: impl AsRef<Path>) -> GeminiResult<AnalysisResult> {
        let payload = self.uploader.prepare(path).await?;
        self.analyze_payload(&payload).await
    }

    /// Analyze an already prepared payload, falling back across models.
    ///
    /// Only server-side failures (5xx, 429) move on to the next model; any other
    /// error is returned as is.
    pub async fn analyze_payload(&self, payload: &VideoPayload) -> GeminiResult<AnalysisResult> {
        let models = &self.client.config().analysis_models;
        let mut last_error = None;

        for model in models {
            info!("Attempting analysis with model: {}", model);
            match self.generate(model, payload).await {
                Ok(result) => {
                    info!(
                        model = %model,
                        scenes = result.scenes.len(),
                        "Storyboard analysis succeeded"
                    );
                    return Ok(result);
                }
                Err(e @ GeminiError::Api { .. }) if e.is_retryable() => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GeminiError::config("No analysis models configured")))
    }

    async fn generate(&self, model: &str, payload: &VideoPayload) -> GeminiResult<AnalysisResult> {
        let url = self
            .client
            .endpoint(&format!("v1beta/models/{}:generateContent", model))?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::video(payload), Part::text(ANALYSIS_INSTRUCTION)],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        };

        let response = self
            .client
            .execute("generate_content", self.client.http().post(url).json(&request))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::from_http_status(
                status.as_u16(),
                error_body(response).await,
            ));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = response_text(&body).ok_or(GeminiError::EmptyResponse)?;
        debug!(model = %model, chars = text.len(), "Received analysis text");

        parse_storyboard(&text)
    }
}

/// Concatenated text of the first candidate, if it has any.
fn response_text(response: &GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode and validate storyboard JSON, tolerating a Markdown code fence.
pub fn parse_storyboard(text: &str) -> GeminiResult<AnalysisResult> {
    let text = strip_code_fence(text);

    let result: AnalysisResult = serde_json::from_str(text)
        .map_err(|e| GeminiError::parse(format!("invalid storyboard JSON: {}", e)))?;

    result
        .validate()
        .map_err(|e| GeminiError::parse(e.to_string()))?;

    Ok(result)
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}
