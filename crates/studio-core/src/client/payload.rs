//! ============================================================================
//! Generation Payloads - The two HeyGen request schemas
//! ============================================================================
//! Avatar IV ("simplified") and Avatar III ("structured") accept different
//! bodies for the same action. Both are reproduced as the API expects them;
//! they are not unified.
//! ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::types::{ClientError, EngineVariant, GenerationRequest};

pub const SIMPLIFIED_PATH: &str = "/v2/video/av4/generate";
pub const STRUCTURED_PATH: &str = "/v2/video/generate";

pub fn endpoint_path(engine: EngineVariant) -> &'static str {
    match engine {
        EngineVariant::Simplified => SIMPLIFIED_PATH,
        EngineVariant::Structured => STRUCTURED_PATH,
    }
}

// ============================================================================
// Avatar IV
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SimplifiedPayload<'a> {
    pub image_key: &'a str,
    pub video_title: &'a str,
    pub script: &'a str,
    pub voice_id: &'a str,
    pub voice_settings: VoiceSettings,
    pub video_orientation: &'a str,
    pub fit: &'a str,
    pub caption: bool,
    pub custom_motion_prompt: &'a str,
    pub enhance_custom_motion_prompt: bool,
}

#[derive(Debug, Serialize)]
pub struct VoiceSettings {
    pub speed: f64,
}

// ============================================================================
// Avatar III
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StructuredPayload<'a> {
    pub title: &'a str,
    pub video_inputs: Vec<VideoInput<'a>>,
    pub dimension: Dimension,
    pub caption: bool,
}

#[derive(Debug, Serialize)]
pub struct VideoInput<'a> {
    pub character: Character<'a>,
    pub voice: TextVoice<'a>,
    pub background: Background<'a>,
}

#[derive(Debug, Serialize)]
pub struct Character<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub talking_photo_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TextVoice<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub input_text: &'a str,
    pub voice_id: &'a str,
    pub speed: f64,
}

#[derive(Debug, Serialize)]
pub struct Background<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

/// Check the request and render the JSON body for `engine`
pub fn build_payload(request: &GenerationRequest, engine: EngineVariant) -> Result<Value, ClientError> {
    validate(request)?;

    let body = match engine {
        EngineVariant::Simplified => serde_json::to_value(SimplifiedPayload {
            image_key: &request.visual_asset_ref,
            video_title: &request.title,
            script: &request.script,
            voice_id: &request.voice_id,
            voice_settings: VoiceSettings { speed: request.speed },
            video_orientation: &request.orientation,
            fit: &request.fit,
            caption: request.caption,
            custom_motion_prompt: &request.motion_prompt,
            enhance_custom_motion_prompt: request.enhance_motion_prompt,
        }),
        EngineVariant::Structured => serde_json::to_value(StructuredPayload {
            title: &request.title,
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "talking_photo",
                    talking_photo_id: &request.visual_asset_ref,
                },
                voice: TextVoice {
                    kind: "text",
                    input_text: &request.script,
                    voice_id: &request.voice_id,
                    speed: request.speed,
                },
                background: Background {
                    kind: "color",
                    value: &request.background_color,
                },
            }],
            dimension: Dimension {
                width: request.width,
                height: request.height,
            },
            caption: request.caption,
        }),
    };

    body.map_err(|e| ClientError::InvalidRequest(format!("Failed to encode payload: {}", e)))
}

fn validate(request: &GenerationRequest) -> Result<(), ClientError> {
    if request.visual_asset_ref.trim().is_empty() {
        return Err(ClientError::InvalidRequest("missing visual asset".to_string()));
    }
    if request.script.trim().is_empty() {
        return Err(ClientError::InvalidRequest("script is empty".to_string()));
    }
    if request.voice_id.trim().is_empty() {
        return Err(ClientError::InvalidRequest("missing voice id".to_string()));
    }
    if !request.speed.is_finite() || request.speed <= 0.0 {
        return Err(ClientError::InvalidRequest(format!("invalid speed {}", request.speed)));
    }
    Ok(())
}
