//! Workflow row model and insert/replace DTOs.

use serde::Serialize;
use sqlx::FromRow;
use studio_core::types::{DbId, Timestamp};
use studio_core::workflow::{Step, WorkflowDefinition, WorkflowSnapshot};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workflow {
    pub id: String,
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub steps: Vec<Step>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Workflow {
    pub fn definition(&self) -> WorkflowDefinition {
        WorkflowDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            steps: self.steps.clone(),
        }
    }

    /// Copy taken at trigger time. Timestamps are left out.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            id: self.id.clone(),
            user_id: self.user_id,
            definition: self.definition(),
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for inserting a workflow under a pre-allocated id.
#[derive(Debug, Clone)]
pub struct CreateWorkflow {
    pub id: String,
    pub user_id: DbId,
    pub definition: WorkflowDefinition,
}

/// Paged search result.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPage {
    pub items: Vec<Workflow>,
    pub total: i64,
}
