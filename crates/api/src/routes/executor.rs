use axum::routing::post;
use axum::Router;

use crate::handlers::executor;
use crate::state::AppState;

/// Executor façade, mounted at the root with its full path.
///
/// A step call lasts as long as the generation job behind it, so this router
/// must be merged outside the request-timeout layer.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/v1/workflows-executor/{kind}",
        post(executor::execute_step),
    )
}
