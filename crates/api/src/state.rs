use std::sync::Arc;

use studio_db::Store;

use crate::config::ServerConfig;
use crate::executor::ExecutorService;
use crate::workflows::WorkflowOrchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Persistence, used directly by the health check.
    pub store: Arc<dyn Store>,
    /// Workflow lifecycle: CRUD, execution, traces.
    pub workflows: Arc<WorkflowOrchestrator>,
    /// Step-kind endpoints called by running workflows.
    pub executor: Arc<ExecutorService>,
}
