//! Route definitions for the `/workflows` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflows;
use crate::state::AppState;

/// Workflow routes mounted at `/workflows`.
///
/// ```text
/// POST   /                                  -> create
/// POST   /search                            -> search
/// GET    /{id}                              -> get_by_id
/// PUT    /{id}                              -> update
/// DELETE /{id}                              -> delete
/// POST   /{id}/workflow-execute             -> execute
/// POST   /{id}/batch-execute                -> batch_execute
/// GET    /{id}/executions                   -> list_executions
/// GET    /{id}/executions/{execution_id}    -> get_execution
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(workflows::create))
        .route("/search", post(workflows::search))
        .route(
            "/{id}",
            get(workflows::get_by_id)
                .put(workflows::update)
                .delete(workflows::delete),
        )
        .route("/{id}/workflow-execute", post(workflows::execute))
        .route("/{id}/batch-execute", post(workflows::batch_execute))
        .route("/{id}/executions", get(workflows::list_executions))
        .route(
            "/{id}/executions/{execution_id}",
            get(workflows::get_execution),
        )
}
