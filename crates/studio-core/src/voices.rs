//! Voice list normalization: `{data: {voices: [...]}}` into sorted
//! [`VoiceOption`]s, custom voices first.

use serde_json::Value;
use std::cmp::Ordering;

use crate::types::{VoiceKind, VoiceOption};

/// `type` values that mark an account-owned voice
const CUSTOM_TYPES: &[&str] = &["custom", "cloned", "private"];

pub fn parse_voices(body: &Value) -> Vec<VoiceOption> {
    let records = body
        .get("data")
        .and_then(|d| d.get("voices"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut voices: Vec<VoiceOption> = records.iter().filter_map(parse_voice).collect();
    sort_voices(&mut voices);
    voices
}

fn parse_voice(record: &Value) -> Option<VoiceOption> {
    let voice_id = record
        .get("voice_id")
        .or_else(|| record.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?
        .to_string();

    let name = record
        .get("name")
        .or_else(|| record.get("display_name"))
        .and_then(Value::as_str)
        .unwrap_or(&voice_id)
        .to_string();

    let language = record
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let custom_type = record
        .get("type")
        .and_then(Value::as_str)
        .map(|t| CUSTOM_TYPES.iter().any(|c| t.eq_ignore_ascii_case(c)))
        .unwrap_or(false);
    let custom_flag = record.get("is_custom").and_then(Value::as_bool).unwrap_or(false);

    Some(VoiceOption {
        voice_id,
        name,
        language,
        kind: if custom_type || custom_flag {
            VoiceKind::Custom
        } else {
            VoiceKind::System
        },
    })
}

/// Custom before system; by name within each group (case-folded, then exact)
pub fn sort_voices(voices: &mut [VoiceOption]) {
    voices.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| compare_names(&a.name, &b.name))
    });
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_voices_first_then_by_name() {
        let body = json!({
            "data": {
                "voices": [
                    { "voice_id": "s2", "name": "zoe", "language": "English" },
                    { "voice_id": "c1", "name": "Studio Julian", "language": "English", "type": "custom" },
                    { "voice_id": "s1", "name": "Aria", "language": "English" },
                    { "voice_id": "c2", "name": "alpha clone", "language": "English", "is_custom": true },
                    { "name": "no id" }
                ]
            }
        });

        let voices = parse_voices(&body);
        let ids: Vec<&str> = voices.iter().map(|v| v.voice_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1", "s1", "s2"]);
        assert_eq!(voices[0].kind, VoiceKind::Custom);
        assert_eq!(voices[3].kind, VoiceKind::System);
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let voices = parse_voices(&json!({ "data": { "voices": [{ "voice_id": "v9" }] } }));
        assert_eq!(voices[0].name, "v9");
        assert_eq!(voices[0].language, "Unknown");
    }

    #[test]
    fn test_unexpected_shape_is_empty() {
        assert!(parse_voices(&json!({ "data": [] })).is_empty());
        assert!(parse_voices(&json!(null)).is_empty());
    }
}
