use studio_core::workflow::execution::short_execution_id;

/// Remote workflow-engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Google Cloud project the workflows are registered in.
    pub project_id: String,
    /// Region of the workflows (default: `us-central1`).
    pub location: String,
    /// Base URL of the workflow-executor façade that compiled steps call.
    pub executor_url: String,
    /// Service account the workflows run as. Engine default when unset.
    pub service_account: Option<String>,
    /// Static bearer token. When unset, tokens come from the metadata server.
    pub access_token: Option<String>,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                          | Default                                          |
    /// |----------------------------------|--------------------------------------------------|
    /// | `PROJECT_ID`                     | required                                         |
    /// | `WORKFLOWS_LOCATION`             | `us-central1`                                    |
    /// | `WORKFLOWS_EXECUTOR_URL`         | `http://localhost:3000/api/v1/workflows-executor`|
    /// | `BACKEND_SERVICE_ACCOUNT_EMAIL`  | unset                                            |
    /// | `WORKFLOWS_ACCESS_TOKEN`         | unset                                            |
    pub fn from_env() -> Self {
        let project_id = std::env::var("PROJECT_ID").expect("PROJECT_ID must be set");

        let location =
            std::env::var("WORKFLOWS_LOCATION").unwrap_or_else(|_| "us-central1".into());

        let executor_url = std::env::var("WORKFLOWS_EXECUTOR_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api/v1/workflows-executor".into());

        Self {
            project_id,
            location,
            executor_url,
            service_account: non_empty_env("BACKEND_SERVICE_ACCOUNT_EMAIL"),
            access_token: non_empty_env("WORKFLOWS_ACCESS_TOKEN"),
        }
    }

    /// `projects/{project}/locations/{location}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    /// Full resource name of a workflow.
    pub fn workflow_name(&self, workflow_id: &str) -> String {
        format!("{}/workflows/{workflow_id}", self.parent())
    }

    /// Full resource name of an execution. Only the last segment of
    /// `execution_id` is used, so the name always sits under `workflow_id`.
    pub fn execution_name(&self, workflow_id: &str, execution_id: &str) -> String {
        format!(
            "{}/executions/{}",
            self.workflow_name(workflow_id),
            short_execution_id(execution_id)
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
