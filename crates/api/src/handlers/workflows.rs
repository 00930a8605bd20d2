//! Handlers for the `/workflows` resource.
//!
//! Every route requires the `admin` role and only ever touches workflows the
//! caller owns.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use studio_core::workflow::batch::{BatchExecutionRequest, BatchExecutionResponse};
use studio_core::workflow::{ExecutionTrace, WorkflowDefinition};
use studio_db::models::workflow::Workflow;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::query::ExecutionListParams;
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;
use crate::workflows::dto::{
    ExecuteWorkflowRequest, ExecuteWorkflowResponse, ExecutionListResponse,
    WorkflowSearchRequest,
};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows
pub async fn create(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> AppResult<(StatusCode, Json<DataResponse<Workflow>>)> {
    let workflow = state.workflows.create(definition, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// POST /api/v1/workflows/search
///
/// Paginated search over the caller's workflows, newest first.
pub async fn search(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<WorkflowSearchRequest>,
) -> AppResult<Json<PaginatedResponse<Workflow>>> {
    let page = state.workflows.search(user.user_id, request).await?;
    Ok(Json(page))
}

/// GET /api/v1/workflows/{id}
pub async fn get_by_id(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = state.workflows.get(&id, user.user_id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// PUT /api/v1/workflows/{id}
pub async fn update(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(definition): Json<WorkflowDefinition>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = state.workflows.update(&id, definition, user.user_id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// DELETE /api/v1/workflows/{id}
pub async fn delete(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.workflows.delete(&id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/workflow-execute
pub async fn execute(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ExecuteWorkflowRequest>,
) -> AppResult<Json<DataResponse<ExecuteWorkflowResponse>>> {
    let execution_id = state.workflows.execute(&id, request.args, &user).await?;

    tracing::info!(workflow_id = %id, %execution_id, user_id = user.user_id, "Workflow execution started");

    Ok(Json(DataResponse {
        data: ExecuteWorkflowResponse { execution_id },
    }))
}

/// POST /api/v1/workflows/{id}/batch-execute
///
/// Always 200 once the workflow is found; per-row failures are reported in
/// the results.
pub async fn batch_execute(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BatchExecutionRequest>,
) -> AppResult<Json<DataResponse<BatchExecutionResponse>>> {
    let response = state.workflows.batch_execute(&id, request, &user).await?;
    Ok(Json(DataResponse { data: response }))
}

/// GET /api/v1/workflows/{id}/executions
pub async fn list_executions(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExecutionListParams>,
) -> AppResult<Json<DataResponse<ExecutionListResponse>>> {
    let page = state
        .workflows
        .list_executions(&id, user.user_id, params)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/workflows/{id}/executions/{execution_id}
pub async fn get_execution(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path((id, execution_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<ExecutionTrace>>> {
    let trace = state
        .workflows
        .execution_trace(&id, &execution_id, user.user_id)
        .await?;
    Ok(Json(DataResponse { data: trace }))
}
