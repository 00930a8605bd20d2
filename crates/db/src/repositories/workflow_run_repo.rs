//! Repository for the `workflow_runs` table.

use sqlx::PgPool;
use studio_core::types::Timestamp;
use studio_core::workflow::WorkflowRunStatus;

use crate::models::workflow_run::{CreateWorkflowRun, WorkflowRun};

const COLUMNS: &str = "id, workflow_id, user_id, workspace_id, status, started_at, \
    completed_at, workflow_snapshot, created_at, updated_at";

pub struct WorkflowRunRepo;

impl WorkflowRunRepo {
    pub async fn create(pool: &PgPool, input: &CreateWorkflowRun) -> Result<WorkflowRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_runs
                (id, workflow_id, user_id, workspace_id, status, started_at, workflow_snapshot)
             VALUES ($1, $2, $3, $4, $5, $6, $7::json)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(&input.id)
            .bind(&input.workflow_id)
            .bind(input.user_id)
            .bind(input.workspace_id)
            .bind(input.status.as_str())
            .bind(input.started_at)
            .bind(input.workflow_snapshot.to_string())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<WorkflowRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflow_runs WHERE id = $1");
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a run to a new status. Returns `true` if a row was updated.
    pub async fn update_status(
        pool: &PgPool,
        id: &str,
        status: WorkflowRunStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_runs
             SET status = $1, completed_at = $2, updated_at = now()
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
