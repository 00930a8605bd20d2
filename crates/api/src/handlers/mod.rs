//! Request handlers.
//!
//! Handlers stay thin: they extract the caller and the body, delegate to the
//! [`WorkflowOrchestrator`](crate::workflows::WorkflowOrchestrator) or the
//! [`ExecutorService`](crate::executor::ExecutorService), and map errors via
//! [`AppError`](crate::error::AppError).

pub mod executor;
pub mod workflows;
