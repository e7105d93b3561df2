//! ============================================================================
//! Core Types for the HeyGen Studio Operator
//! ============================================================================
//! Data model shared by the client, the library aggregator and the CLI.
//! Most types serialize to JSON for `--json` output.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Credential
// ============================================================================

/// HeyGen API key. Opaque; formatting never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key, only for the `X-Api-Key` header and the durable slot
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ============================================================================
// Voices
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    Custom,
    System,
}

/// A selectable voice. Lists sort custom first, then by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceOption {
    pub voice_id: String,
    pub name: String,
    pub language: String,
    #[serde(rename = "type")]
    pub kind: VoiceKind,
}

// ============================================================================
// Library
// ============================================================================

/// Remote record family a library asset was normalized from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    GroupLook,
    Avatar,
    TalkingPhoto,
    Asset,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroupLook => "group_look",
            Self::Avatar => "avatar",
            Self::TalkingPhoto => "talking_photo",
            Self::Asset => "asset",
        }
    }
}

/// Normalized library entry usable as a video's visual input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryAsset {
    pub asset_id: String,
    pub display_name: String,
    pub preview_image_url: Option<String>,
    pub is_stock: bool,
    pub is_priority_target: bool,
    pub group_id: Option<String>,
    pub source: SourceKind,
}

/// Outcome of a binary upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResult {
    pub asset_id: String,
    pub image_key: Option<String>,
}

// ============================================================================
// Video Generation
// ============================================================================

/// The two incompatible generation schemas exposed by the remote API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineVariant {
    /// Avatar IV: flat payload keyed by `image_key`
    Simplified,
    /// Avatar III: `video_inputs` array with a talking-photo character
    Structured,
}

impl std::str::FromStr for EngineVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simplified" | "v4" | "av4" => Ok(Self::Simplified),
            "structured" | "v3" => Ok(Self::Structured),
            other => Err(format!(
                "Unknown engine '{}'. Valid values: simplified, structured",
                other
            )),
        }
    }
}

impl EngineVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simplified => "simplified",
            Self::Structured => "structured",
        }
    }
}

pub const DEFAULT_SPEED: f64 = 1.25;
pub const DEFAULT_MOTION_PROMPT: &str =
    "Man talking on a podcast directly to the viewer holding steady eye contact with the camera.";

/// Operator input for a generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub title: String,
    pub script: String,
    pub voice_id: String,
    pub speed: f64,
    /// `image_key` (simplified) or `talking_photo_id` (structured)
    pub visual_asset_ref: String,
    pub orientation: String,
    pub fit: String,
    pub caption: bool,
    pub motion_prompt: String,
    pub enhance_motion_prompt: bool,
    pub background_color: String,
    pub width: u32,
    pub height: u32,
}

impl GenerationRequest {
    pub fn new(
        visual_asset_ref: impl Into<String>,
        script: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            title: format!("Studio - {}", chrono::Local::now().format("%H:%M:%S")),
            script: script.into(),
            voice_id: voice_id.into(),
            speed: DEFAULT_SPEED,
            visual_asset_ref: visual_asset_ref.into(),
            orientation: "portrait".to_string(),
            fit: "cover".to_string(),
            caption: false,
            motion_prompt: DEFAULT_MOTION_PROMPT.to_string(),
            enhance_motion_prompt: true,
            background_color: "#000000".to_string(),
            width: 720,
            height: 1280,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

/// A submitted job, tracked only through the remote video id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationJob {
    pub video_id: String,
    pub title: String,
    pub script: String,
    pub voice_id: String,
    pub speed: f64,
    pub engine_variant: EngineVariant,
    pub visual_asset_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Waiting,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl JobState {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "waiting" => Self::Waiting,
            "processing" => Self::Processing,
            "completed" | "done" | "succeeded" => Self::Completed,
            "failed" | "error" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Remote job state as reported by the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoStatus {
    pub video_id: String,
    pub status: JobState,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<f64>,
    pub error: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error taxonomy of the API client boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("No API key found. Unlock the studio with your HeyGen key.")]
    AuthenticationMissing,

    #[error("HeyGen API error {status}: {message}")]
    RemoteApiError { status: u16, message: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// True for 401 responses, which lock the vault
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::RemoteApiError { status: 401, .. })
    }
}
