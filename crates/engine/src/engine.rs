use async_trait::async_trait;
use studio_core::workflow::execution::{ExecutionPage, RemoteExecution, StepLogEntry};

use crate::error::EngineError;

/// Operations the backend needs from a remote workflow engine.
///
/// Workflows are addressed by the same opaque id they have locally.
/// Execution ids may be short ids or fully qualified resource names.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Register a new workflow with the given source.
    async fn create_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError>;

    /// Replace the source of an existing workflow.
    async fn update_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError>;

    /// Deregister a workflow. Fails with [`EngineError::NotFound`] if absent.
    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), EngineError>;

    /// Start an execution with `argument` as its sole runtime argument.
    async fn create_execution(
        &self,
        workflow_id: &str,
        argument: &serde_json::Value,
    ) -> Result<RemoteExecution, EngineError>;

    /// Fetch one execution. `None` if it does not exist.
    async fn get_execution(
        &self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Result<Option<RemoteExecution>, EngineError>;

    /// The execution's full step log, in engine order.
    async fn list_step_entries(
        &self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Result<Vec<StepLogEntry>, EngineError>;

    /// One page of a workflow's executions, newest first.
    async fn list_executions(
        &self,
        workflow_id: &str,
        page_size: i64,
        page_token: Option<&str>,
        filter: Option<&str>,
    ) -> Result<ExecutionPage, EngineError>;
}
