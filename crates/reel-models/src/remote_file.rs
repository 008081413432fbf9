//! Files held by the remote generation service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Bytes are still being sent
    Uploading,
    /// Uploaded, the service is still preparing it
    #[default]
    Processing,
    /// Ready to be referenced from a request
    Active,
    /// The service gave up on the file
    Failed,
    /// Any state this client does not know about
    #[serde(other, rename = "STATE_UNSPECIFIED")]
    Unspecified,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Uploading => "UPLOADING",
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Unspecified => "STATE_UNSPECIFIED",
        }
    }

    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Active | FileState::Failed)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transient reference to an uploaded file. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileHandle {
    /// Resource name, e.g. "files/abc123"
    pub name: String,

    /// URI used to reference the file from a request
    #[serde(default)]
    pub uri: String,

    /// MIME type declared at upload
    #[serde(default)]
    pub mime_type: String,

    /// Lifecycle state
    #[serde(default)]
    pub state: FileState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_wire_handle() {
        let json = r#"{
            "name": "files/abc",
            "uri": "https://example.com/v1beta/files/abc",
            "mimeType": "video/mp4",
            "state": "ACTIVE",
            "sizeBytes": "123"
        }"#;
        let handle: RemoteFileHandle = serde_json::from_str(json).unwrap();
        assert_eq!(handle.name, "files/abc");
        assert_eq!(handle.state, FileState::Active);
        assert!(handle.state.is_terminal());
    }

    #[test]
    fn test_unknown_state_is_not_terminal() {
        let handle: RemoteFileHandle =
            serde_json::from_str(r#"{"name": "files/x", "state": "ARCHIVED"}"#).unwrap();
        assert_eq!(handle.state, FileState::Unspecified);
        assert!(!handle.state.is_terminal());
    }

    #[test]
    fn test_missing_state_defaults_to_processing() {
        let handle: RemoteFileHandle = serde_json::from_str(r#"{"name": "files/x"}"#).unwrap();
        assert_eq!(handle.state, FileState::Processing);
    }
}
