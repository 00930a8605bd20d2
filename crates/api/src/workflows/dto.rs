//! Request and response bodies of the workflow endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use studio_core::workflow::execution::ExecutionSummary;

/// Body of `POST /workflows/search`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkflowSearchRequest {
    /// Case-insensitive substring of the workflow name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Body of `POST /workflows/{id}/workflow-execute`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteWorkflowRequest {
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteWorkflowResponse {
    pub execution_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExecutionListResponse {
    pub executions: Vec<ExecutionSummary>,
    pub next_page_token: Option<String>,
}
