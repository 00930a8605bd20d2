//! Normalization of resolved media inputs into backend request shapes.
//!
//! A media input reaching the executor is a generated media id, a media
//! reference object, or an arbitrarily nested list of those. Anything else
//! is ignored.

use serde::Serialize;
use serde_json::{json, Value};
use studio_core::types::DbId;
use studio_core::workflow::step::MediaRef;
use studio_core::workflow::InputValue;

pub const ROLE_INPUT: &str = "input";
pub const ROLE_IMAGE_REFERENCE: &str = "image_reference_asset";
pub const ROLE_START_FRAME: &str = "start_frame";
pub const ROLE_END_FRAME: &str = "end_frame";

/// One media item of a prior generation, as the backend expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItemLink {
    pub media_item_id: DbId,
    pub media_index: i64,
    pub role: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct NormalizedMedia {
    pub media_items: Vec<MediaItemLink>,
    pub asset_ids: Vec<DbId>,
}

/// Split a media input into media item links and uploaded asset ids.
///
/// Bare ids become the first media of that item. Links without a role get
/// `default_role`.
pub fn normalize_media(value: &Value, default_role: &str) -> NormalizedMedia {
    let mut out = NormalizedMedia::default();
    collect(&InputValue::from_json(value.clone()), default_role, &mut out);
    out
}

fn collect(value: &InputValue, default_role: &str, out: &mut NormalizedMedia) {
    match value {
        InputValue::Sequence(items) => {
            for item in items {
                collect(item, default_role, out);
            }
        }
        InputValue::Literal(Value::Number(n)) => {
            if let Some(media_item_id) = n.as_i64() {
                out.media_items.push(MediaItemLink {
                    media_item_id,
                    media_index: 0,
                    role: default_role.to_string(),
                });
            }
        }
        InputValue::Media(MediaRef {
            source_media_item: Some(link),
            ..
        }) => {
            let role = if link.role.is_empty() {
                default_role
            } else {
                link.role.as_str()
            };
            out.media_items.push(MediaItemLink {
                media_item_id: link.media_item_id,
                media_index: link.media_index,
                role: role.to_string(),
            });
        }
        InputValue::Media(MediaRef {
            source_asset_id: Some(asset_id),
            ..
        }) => out.asset_ids.push(*asset_id),
        _ => {}
    }
}

/// Garment or person link for virtual try-on. Only the first element of a
/// list is used.
pub fn vto_link(value: &Value) -> Option<Value> {
    let first = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };

    match InputValue::from_json(first.clone()) {
        InputValue::Media(MediaRef {
            source_media_item: Some(link),
            ..
        }) => Some(json!({
            "source_media_item": {
                "media_item_id": link.media_item_id,
                "media_index": link.media_index,
            }
        })),
        InputValue::Media(MediaRef {
            source_asset_id: Some(asset_id),
            ..
        }) => Some(json!({ "source_asset_id": asset_id })),
        InputValue::Literal(Value::Number(n)) => n.as_i64().map(|media_item_id| {
            json!({
                "source_media_item": { "media_item_id": media_item_id, "media_index": 0 }
            })
        }),
        _ => None,
    }
}
