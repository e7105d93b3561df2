//! ============================================================================
//! Field Table - Where each remote record family keeps its values
//! ============================================================================
//! HeyGen returns the same logical asset in several shapes. Each source kind
//! gets one `SourceShape` row; fields are tried in the order listed, most
//! specific first, generic `id` last.
//! ============================================================================

use serde_json::Value;

use crate::types::{LibraryAsset, SourceKind};

/// Lookup table for one remote record family
#[derive(Debug, Clone, Copy)]
pub struct SourceShape {
    pub kind: SourceKind,
    /// Array keys under `data` when `data` is an object
    pub collection_keys: &'static [&'static str],
    pub id_fields: &'static [&'static str],
    pub name_fields: &'static [&'static str],
    pub preview_fields: &'static [&'static str],
    pub group_fields: &'static [&'static str],
    /// Stock unless a custom marker is present
    pub stock_by_default: bool,
    /// Fields whose truthy presence marks an account-owned record
    pub custom_markers: &'static [&'static str],
}

pub const GROUP_LOOK_SHAPE: SourceShape = SourceShape {
    kind: SourceKind::GroupLook,
    collection_keys: &["avatar_list", "avatars", "looks"],
    id_fields: &["avatar_id", "talking_photo_id", "id"],
    name_fields: &["avatar_name", "name", "look_name"],
    preview_fields: &["image_url", "preview_image_url", "motion_preview_url"],
    group_fields: &["group_id", "avatar_group_id"],
    stock_by_default: false,
    custom_markers: &[],
};

pub const AVATAR_SHAPE: SourceShape = SourceShape {
    kind: SourceKind::Avatar,
    collection_keys: &["avatars", "talking_photos"],
    id_fields: &["avatar_id", "talking_photo_id", "id"],
    name_fields: &["avatar_name", "talking_photo_name", "name"],
    preview_fields: &["preview_image_url", "image_url"],
    group_fields: &["group_id", "avatar_group_id"],
    stock_by_default: true,
    custom_markers: &["talking_photo_id", "is_custom"],
};

pub const TALKING_PHOTO_SHAPE: SourceShape = SourceShape {
    kind: SourceKind::TalkingPhoto,
    collection_keys: &["talking_photos", "list"],
    id_fields: &["talking_photo_id", "id"],
    name_fields: &["talking_photo_name", "name"],
    preview_fields: &["preview_image_url", "image_url", "circle_image"],
    group_fields: &["group_id"],
    stock_by_default: false,
    custom_markers: &[],
};

pub const ASSET_SHAPE: SourceShape = SourceShape {
    kind: SourceKind::Asset,
    collection_keys: &["assets", "list"],
    id_fields: &["asset_id", "id"],
    name_fields: &["name", "file_name"],
    preview_fields: &["url", "image_url", "preview_image_url"],
    group_fields: &[],
    stock_by_default: false,
    custom_markers: &[],
};

/// Rows in combination order: first occurrence wins on dedupe
pub const SOURCE_SHAPES: [SourceShape; 4] = [
    GROUP_LOOK_SHAPE,
    AVATAR_SHAPE,
    TALKING_PHOTO_SHAPE,
    ASSET_SHAPE,
];

/// Keys of the group array in `avatar_group.list`
pub const GROUP_LIST_KEYS: &[&str] = &["avatar_group_list", "groups", "list"];
pub const GROUP_ID_FIELDS: &[&str] = &["group_id", "avatar_group_id", "id"];

/// Records under `data`: the array itself, or the listed arrays of an object
pub fn records<'a>(body: &'a Value, collection_keys: &[&str]) -> Vec<&'a Value> {
    match body.get("data") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => collection_keys
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_array))
            .flatten()
            .collect(),
        _ => Vec::new(),
    }
}

/// First non-empty string (or number) among `fields`
pub fn first_field(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Map one record onto a [`LibraryAsset`]; None without a resolvable id
pub fn normalize_record(
    shape: &SourceShape,
    record: &Value,
    fallback_group: Option<&str>,
) -> Option<LibraryAsset> {
    let asset_id = first_field(record, shape.id_fields)?;
    let display_name = first_field(record, shape.name_fields).unwrap_or_else(|| asset_id.clone());

    let is_stock = match record.get("is_stock").and_then(Value::as_bool) {
        Some(explicit) => explicit,
        None => {
            shape.stock_by_default
                && !shape.custom_markers.iter().any(|m| is_truthy(record.get(*m)))
        }
    };

    Some(LibraryAsset {
        asset_id,
        display_name,
        preview_image_url: first_field(record, shape.preview_fields),
        is_stock,
        is_priority_target: false,
        group_id: first_field(record, shape.group_fields)
            .or_else(|| fallback_group.map(str::to_string)),
        source: shape.kind,
    })
}

/// Normalize every record of a listing response
pub fn normalize_records(
    shape: &SourceShape,
    body: &Value,
    fallback_group: Option<&str>,
) -> Vec<LibraryAsset> {
    records(body, shape.collection_keys)
        .into_iter()
        .filter_map(|record| normalize_record(shape, record, fallback_group))
        .collect()
}

/// Group ids from an `avatar_group.list` response, in listed order
pub fn group_ids(body: &Value) -> Vec<String> {
    records(body, GROUP_LIST_KEYS)
        .into_iter()
        .filter_map(|group| first_field(group, GROUP_ID_FIELDS))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_specific_id_field_wins() {
        let record = json!({ "id": "generic", "avatar_id": "av_1", "avatar_name": "Julian" });
        let asset = normalize_record(&AVATAR_SHAPE, &record, None).unwrap();
        assert_eq!(asset.asset_id, "av_1");
        assert_eq!(asset.display_name, "Julian");
        assert!(asset.is_stock);

        let record = json!({ "id": "generic", "talking_photo_id": "tp_1" });
        let asset = normalize_record(&TALKING_PHOTO_SHAPE, &record, None).unwrap();
        assert_eq!(asset.asset_id, "tp_1");
        assert_eq!(asset.display_name, "tp_1");
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let body = json!({ "data": { "assets": [{ "name": "orphan" }, { "id": 42, "url": "https://x/y.png" }] } });
        let assets = normalize_records(&ASSET_SHAPE, &body, None);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_id, "42");
        assert_eq!(assets[0].preview_image_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(assets[0].source, SourceKind::Asset);
    }

    #[test]
    fn test_avatar_collections_and_custom_markers() {
        let body = json!({
            "data": {
                "avatars": [{ "avatar_id": "stock_1", "avatar_name": "Anna" }],
                "talking_photos": [{ "talking_photo_id": "tp_9", "talking_photo_name": "Me" }]
            }
        });
        let assets = normalize_records(&AVATAR_SHAPE, &body, None);
        assert_eq!(assets.len(), 2);
        assert!(assets[0].is_stock);
        assert!(!assets[1].is_stock);
        assert_eq!(assets[1].asset_id, "tp_9");
    }

    #[test]
    fn test_explicit_stock_flag() {
        let record = json!({ "avatar_id": "a", "is_stock": false });
        assert!(!normalize_record(&AVATAR_SHAPE, &record, None).unwrap().is_stock);
    }

    #[test]
    fn test_group_look_takes_fallback_group() {
        let body = json!({ "data": { "avatar_list": [
            { "id": "look_1", "name": "Studio", "image_url": "https://img/1" },
            { "id": "look_2", "group_id": "other" }
        ] } });
        let looks = normalize_records(&GROUP_LOOK_SHAPE, &body, Some("grp_1"));
        assert_eq!(looks[0].group_id.as_deref(), Some("grp_1"));
        assert_eq!(looks[0].preview_image_url.as_deref(), Some("https://img/1"));
        assert_eq!(looks[1].group_id.as_deref(), Some("other"));
        assert!(!looks[0].is_stock);
    }

    #[test]
    fn test_data_as_bare_array() {
        let body = json!({ "data": [{ "talking_photo_id": "tp_1" }, { "id": "tp_2" }] });
        let ids: Vec<String> = normalize_records(&TALKING_PHOTO_SHAPE, &body, None)
            .into_iter()
            .map(|a| a.asset_id)
            .collect();
        assert_eq!(ids, vec!["tp_1", "tp_2"]);
    }

    #[test]
    fn test_group_ids() {
        let body = json!({ "data": { "avatar_group_list": [
            { "id": "g1" }, { "group_id": "g2" }, { "name": "no id" }
        ] } });
        assert_eq!(group_ids(&body), vec!["g1", "g2"]);
        assert!(group_ids(&json!({ "error": "x" })).is_empty());
    }
}
