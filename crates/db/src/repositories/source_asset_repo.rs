//! Repository for the `source_assets` table.

use sqlx::PgPool;

use crate::models::source_asset::{CreateSourceAsset, SourceAsset};

const COLUMNS: &str = "id, user_id, workspace_id, gcs_uri, original_filename, mime_type, \
    created_at, updated_at";

pub struct SourceAssetRepo;

impl SourceAssetRepo {
    /// Insert an asset, or return the existing one for the same
    /// `(workspace_id, gcs_uri)`.
    pub async fn upsert_by_uri(
        pool: &PgPool,
        input: &CreateSourceAsset,
    ) -> Result<SourceAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO source_assets
                (user_id, workspace_id, gcs_uri, original_filename, mime_type)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (workspace_id, gcs_uri)
                DO UPDATE SET updated_at = now()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SourceAsset>(&query)
            .bind(input.user_id)
            .bind(input.workspace_id)
            .bind(&input.gcs_uri)
            .bind(&input.original_filename)
            .bind(&input.mime_type)
            .fetch_one(pool)
            .await
    }
}
