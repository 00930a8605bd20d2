//! Handler for the workflow-executor façade.
//!
//! Called by running workflows, not by people. The body is answered raw
//! (no `data` envelope) because compiled workflows read
//! `<step>_result.body.<output>` directly.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use studio_core::workflow::StepKind;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// POST /api/v1/workflows-executor/{kind}
///
/// Runs one step to completion. The caller's `Authorization` header is
/// forwarded to the generation backend unchanged.
pub async fn execute_step(
    user: AuthUser,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let kind: StepKind = kind
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown step kind '{kind}'")))?;

    let output = state
        .executor
        .execute(kind, body, Some(&user.authorization))
        .await?;
    Ok(Json(output))
}
