//! Repository for the `workflows` table.

use sqlx::PgPool;
use studio_core::types::DbId;
use studio_core::workflow::{Step, WorkflowDefinition};

use crate::models::workflow::{CreateWorkflow, Workflow, WorkflowPage};

/// Column list for workflows queries.
const COLUMNS: &str = "id, user_id, name, description, steps, created_at, updated_at";

/// Provides CRUD operations for workflows.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Insert a new workflow, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows (id, user_id, name, description, steps)
             VALUES ($1, $2, $3, $4, $5::json)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(&input.id)
            .bind(input.user_id)
            .bind(&input.definition.name)
            .bind(&input.definition.description)
            .bind(steps_json(&input.definition.steps)?)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Search a user's workflows by case-insensitive name substring, newest first.
    pub async fn search(
        pool: &PgPool,
        user_id: DbId,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<WorkflowPage, sqlx::Error> {
        let pattern = name
            .filter(|n| !n.is_empty())
            .map(|n| format!("%{}%", escape_like(n)));

        let query = format!(
            "SELECT {COLUMNS} FROM workflows
             WHERE user_id = $1 AND ($2::text IS NULL OR name ILIKE $2)
             ORDER BY created_at DESC, id
             LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Workflow>(&query)
            .bind(user_id)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workflows
             WHERE user_id = $1 AND ($2::text IS NULL OR name ILIKE $2)",
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

        Ok(WorkflowPage { items, total })
    }

    /// Replace name, description and the whole step list.
    pub async fn replace(
        pool: &PgPool,
        id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows SET
                name = $1,
                description = $2,
                steps = $3::json,
                updated_at = now()
             WHERE id = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(&definition.name)
            .bind(&definition.description)
            .bind(steps_json(&definition.steps)?)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a workflow. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Steps are bound as text and cast to `json`; a `jsonb` parameter would
/// reorder object keys before the column sees them.
fn steps_json(steps: &[Step]) -> Result<String, sqlx::Error> {
    serde_json::to_string(steps).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
