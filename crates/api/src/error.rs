use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use studio_core::error::CoreError;
use studio_engine::EngineError;

use crate::executor::ExecutorError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors, the engine and executor failure
/// channels, and adds HTTP-specific variants. Implements [`IntoResponse`] to
/// produce consistent `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `studio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The remote workflow engine rejected or failed a call.
    #[error("Workflow engine error: {0}")]
    Engine(#[from] EngineError),

    /// A generation request made by the executor façade failed.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Upstream services ---
            AppError::Engine(err) => classify_engine_error(err),
            AppError::Executor(err) => classify_executor_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

/// Engine failures are 502 with the detail kept in the logs.
fn classify_engine_error(err: &EngineError) -> (StatusCode, &'static str, String) {
    if err.is_not_found() {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found in workflow engine".to_string(),
        );
    }
    tracing::error!(error = %err, "Workflow engine error");
    (
        StatusCode::BAD_GATEWAY,
        "ENGINE_ERROR",
        "Workflow engine request failed".to_string(),
    )
}

/// Backend statuses are passed through so the engine sees the real cause.
fn classify_executor_error(err: &ExecutorError) -> (StatusCode, &'static str, String) {
    match err {
        ExecutorError::BadInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        ExecutorError::Backend { status, .. } | ExecutorError::Polling { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, "BACKEND_ERROR", err.to_string())
        }
        ExecutorError::MissingId(_) | ExecutorError::GenerationFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "GENERATION_FAILED",
            err.to_string(),
        ),
        ExecutorError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT", err.to_string()),
        ExecutorError::NotImplemented(_) => {
            (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", err.to_string())
        }
        ExecutorError::Request(inner) => {
            tracing::error!(error = %inner, "Generation backend unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "BACKEND_UNREACHABLE",
                "Generation backend unreachable".to_string(),
            )
        }
    }
}
