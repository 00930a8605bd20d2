//! Workflow run rows: one per triggered execution, carrying the snapshot.

use serde::Serialize;
use sqlx::FromRow;
use studio_core::types::{DbId, Timestamp};
use studio_core::workflow::{WorkflowRunStatus, WorkflowSnapshot};

/// A row from the `workflow_runs` table. `id` is the engine's execution id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_id: String,
    pub user_id: DbId,
    pub workspace_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub status: WorkflowRunStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub workflow_snapshot: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowRun {
    /// Rehydrate the stored snapshot. `None` if it no longer parses.
    pub fn snapshot(&self) -> Option<WorkflowSnapshot> {
        serde_json::from_value(self.workflow_snapshot.clone())
            .inspect_err(|e| {
                tracing::error!(run_id = %self.id, error = %e, "Failed to rehydrate workflow snapshot");
            })
            .ok()
    }
}

/// Input for recording a new run.
#[derive(Debug, Clone)]
pub struct CreateWorkflowRun {
    pub id: String,
    pub workflow_id: String,
    pub user_id: DbId,
    pub workspace_id: Option<DbId>,
    pub status: WorkflowRunStatus,
    pub started_at: Timestamp,
    pub workflow_snapshot: serde_json::Value,
}
