//! JSON shapes of the Workflows and Workflow Executions REST APIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use studio_core::types::Timestamp;
use studio_core::workflow::execution::{
    ExecutionPage, ExecutionState, RemoteExecution, StepEntryState, StepLogEntry,
};

/// Detailed history makes step entries carry their variable data.
pub const EXECUTION_HISTORY_DETAILED: &str = "EXECUTION_HISTORY_DETAILED";

// ---------------------------------------------------------------------------
// Workflows API
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResource<'a> {
    pub source_contents: &'a str,
    pub execution_history_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<&'a str>,
}

/// A long-running operation.
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Status>,
}

#[derive(Debug, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Executions API
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CreateExecution {
    /// JSON-encoded runtime argument.
    pub argument: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub name: String,
    #[serde(default)]
    pub state: Option<ExecutionState>,
    #[serde(default)]
    pub argument: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<ExecutionError>,
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionError {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl From<Execution> for RemoteExecution {
    fn from(e: Execution) -> Self {
        RemoteExecution {
            name: e.name,
            state: e.state.unwrap_or(ExecutionState::Unspecified),
            argument: e.argument,
            result: e.result,
            error: e.error.and_then(|err| err.context.or(err.payload)),
            start_time: e.start_time,
            end_time: e.end_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExecutions {
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<ListExecutions> for ExecutionPage {
    fn from(list: ListExecutions) -> Self {
        ExecutionPage {
            executions: list.executions.into_iter().map(Into::into).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEntry {
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub state: Option<StepEntryState>,
    #[serde(default)]
    pub create_time: Option<Timestamp>,
    #[serde(default)]
    pub update_time: Option<Timestamp>,
    #[serde(default)]
    pub variable_data: Option<VariableData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VariableData {
    #[serde(default)]
    pub variables: serde_json::Map<String, Value>,
}

impl From<StepEntry> for StepLogEntry {
    fn from(e: StepEntry) -> Self {
        StepLogEntry {
            step: e.step,
            state: e.state.unwrap_or(StepEntryState::Unspecified),
            create_time: e.create_time,
            update_time: e.update_time,
            variables: e.variable_data.unwrap_or_default().variables,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStepEntries {
    #[serde(default)]
    pub step_entries: Vec<StepEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
