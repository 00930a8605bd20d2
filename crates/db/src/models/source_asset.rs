use serde::Serialize;
use sqlx::FromRow;
use studio_core::types::{DbId, Timestamp};

/// A row from the `source_assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceAsset {
    pub id: DbId,
    pub user_id: DbId,
    pub workspace_id: DbId,
    pub gcs_uri: String,
    pub original_filename: String,
    pub mime_type: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for ingesting an asset from a storage URI.
#[derive(Debug, Clone)]
pub struct CreateSourceAsset {
    pub user_id: DbId,
    pub workspace_id: DbId,
    pub gcs_uri: String,
    pub original_filename: String,
    pub mime_type: String,
}
