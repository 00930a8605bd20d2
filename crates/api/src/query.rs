//! Query parameter types shared by handlers.

use serde::Deserialize;

/// Query for `GET /workflows/{id}/executions`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionListParams {
    pub limit: Option<i64>,
    pub page_token: Option<String>,
    /// An execution state such as `SUCCEEDED`, or `ALL`.
    pub status: Option<String>,
}
