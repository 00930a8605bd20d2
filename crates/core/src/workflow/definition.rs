//! Workflow definitions, run status, and the frozen snapshot stored per run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::DbId;

use super::step::{Step, StepKind};

/// Prefix of every workflow id. The engine requires ids to start with a letter.
pub const WORKFLOW_ID_PREFIX: &str = "id-";

/// Maximum length of a workflow name.
pub const MAX_WORKFLOW_NAME_LEN: u64 = 200;

/// Allocate a fresh opaque workflow id.
pub fn new_workflow_id(uuid: impl fmt::Display) -> String {
    format!("{WORKFLOW_ID_PREFIX}{uuid}")
}

/// The editable template: what a user creates, updates, and executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WorkflowDefinition {
    #[validate(length(min = 1, max = MAX_WORKFLOW_NAME_LEN))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// The user-input step, if the workflow starts with one.
    pub fn user_input_step(&self) -> Option<&Step> {
        self.steps
            .first()
            .filter(|step| step.kind() == StepKind::UserInput)
    }

    pub fn find_step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }
}

/// Immutable copy of a workflow taken when a run is triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub id: String,
    pub user_id: DbId,
    #[serde(flatten)]
    pub definition: WorkflowDefinition,
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Local status of a workflow run.
///
/// `running` moves to one of the terminal states only when a trace read
/// observes a terminal remote state. `scheduled` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Scheduled,
}

impl WorkflowRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowRunStatus::Running => "running",
            WorkflowRunStatus::Completed => "completed",
            WorkflowRunStatus::Failed => "failed",
            WorkflowRunStatus::Canceled => "canceled",
            WorkflowRunStatus::Scheduled => "scheduled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowRunStatus::Completed | WorkflowRunStatus::Failed | WorkflowRunStatus::Canceled
        )
    }
}

impl fmt::Display for WorkflowRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowRunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(WorkflowRunStatus::Running),
            "completed" => Ok(WorkflowRunStatus::Completed),
            "failed" => Ok(WorkflowRunStatus::Failed),
            "canceled" => Ok(WorkflowRunStatus::Canceled),
            "scheduled" => Ok(WorkflowRunStatus::Scheduled),
            other => Err(CoreError::Validation(format!(
                "Unknown workflow run status '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for WorkflowRunStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
