pub mod executor;
pub mod health;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows                                   create (POST, admin)
/// /workflows/search                            search own workflows (POST)
/// /workflows/{id}                              get, update, delete (owner)
/// /workflows/{id}/workflow-execute             start one run (POST)
/// /workflows/{id}/batch-execute                start one run per row (POST)
/// /workflows/{id}/executions                   list executions (GET)
/// /workflows/{id}/executions/{execution_id}    execution trace (GET)
/// ```
///
/// The executor façade (`/workflows-executor/{kind}`) is mounted separately
/// by [`executor::router`] so it escapes the request timeout.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/workflows", workflows::router())
}
