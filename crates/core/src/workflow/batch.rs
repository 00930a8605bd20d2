//! Batch execution request/response types and argument classification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::DbId;

use super::compiler::WORKSPACE_ID_PARAM;

/// Scheme of storage URIs that are ingested as source assets before a run.
pub const STORAGE_URI_SCHEME: &str = "gs://";

pub fn is_storage_uri(s: &str) -> bool {
    s.starts_with(STORAGE_URI_SCHEME)
}

/// How a batch argument value is handled before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchArgument<'a> {
    /// Passed through unchanged.
    Plain,
    /// A single storage URI, replaced by one media reference.
    StorageUri(&'a str),
    /// A list led by a storage URI, replaced element-wise.
    StorageUriList(Vec<&'a str>),
}

/// Classify an argument value. A list counts as a URI list when its first
/// element is a storage URI; every element must then be a string.
pub fn classify_argument(value: &Value) -> Result<BatchArgument<'_>, CoreError> {
    match value {
        Value::String(s) if is_storage_uri(s) => Ok(BatchArgument::StorageUri(s)),
        Value::Array(items) => {
            let leads_with_uri = items
                .first()
                .and_then(Value::as_str)
                .is_some_and(is_storage_uri);
            if !leads_with_uri {
                return Ok(BatchArgument::Plain);
            }
            items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        CoreError::Validation(format!("expected a storage URI, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(BatchArgument::StorageUriList)
        }
        _ => Ok(BatchArgument::Plain),
    }
}

/// Workspace id from a runtime argument bag: a number or a numeric string.
pub fn parse_workspace_id(args: &Map<String, Value>) -> Option<DbId> {
    match args.get(WORKSPACE_ID_PARAM)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Media reference substituted for an ingested storage URI.
pub fn ingested_media(asset_id: DbId, uri: &str) -> Value {
    serde_json::json!({ "sourceAssetId": asset_id, "previewUrl": uri })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub row_index: i64,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchExecutionRequest {
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchItemStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemResult {
    pub row_index: i64,
    pub status: BatchItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    pub fn success(row_index: i64, execution_id: String) -> Self {
        Self {
            row_index,
            status: BatchItemStatus::Success,
            execution_id: Some(execution_id),
            error: None,
        }
    }

    pub fn failed(row_index: i64, error: impl Into<String>) -> Self {
        Self {
            row_index,
            status: BatchItemStatus::Failed,
            execution_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchExecutionResponse {
    pub results: Vec<BatchItemResult>,
}
