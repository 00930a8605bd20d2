//! REST client for Google Cloud Workflows and Workflow Executions.
//!
//! Wraps the `workflows.googleapis.com` and `workflowexecutions.googleapis.com`
//! v1 endpoints using [`reqwest`]. Workflow mutations return long-running
//! operations, which are polled here until done.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use studio_core::workflow::execution::{ExecutionPage, RemoteExecution, StepLogEntry};

use crate::config::EngineConfig;
use crate::engine::WorkflowEngine;
use crate::error::EngineError;
use crate::token::TokenSource;
use crate::wire::{
    CreateExecution, Execution, ListExecutions, ListStepEntries, Operation, WorkflowResource,
    EXECUTION_HISTORY_DETAILED,
};

const WORKFLOWS_API: &str = "https://workflows.googleapis.com/v1";
const EXECUTIONS_API: &str = "https://workflowexecutions.googleapis.com/v1";

/// Delay between polls of a long-running operation.
const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls before an operation is reported as stuck.
const OPERATION_MAX_POLLS: u32 = 120;

const STEP_ENTRIES_PAGE_SIZE: u32 = 100;

/// HTTP client for one project/location of Cloud Workflows.
pub struct CloudWorkflowsClient {
    client: reqwest::Client,
    config: EngineConfig,
    tokens: TokenSource,
}

impl CloudWorkflowsClient {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: EngineConfig) -> Self {
        let tokens = TokenSource::from_config(config.access_token.clone());
        Self {
            client,
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn workflows_url(&self) -> String {
        format!("{WORKFLOWS_API}/{}/workflows", self.config.parent())
    }

    fn workflow_url(&self, workflow_id: &str) -> String {
        format!("{WORKFLOWS_API}/{}", self.config.workflow_name(workflow_id))
    }

    fn executions_url(&self, workflow_id: &str) -> String {
        format!(
            "{EXECUTIONS_API}/{}/executions",
            self.config.workflow_name(workflow_id)
        )
    }

    fn execution_url(&self, workflow_id: &str, execution_id: &str) -> String {
        format!(
            "{EXECUTIONS_API}/{}",
            self.config.execution_name(workflow_id, execution_id)
        )
    }

    fn workflow_resource<'a>(&'a self, source: &'a str) -> WorkflowResource<'a> {
        WorkflowResource {
            source_contents: source,
            execution_history_level: EXECUTION_HISTORY_DETAILED,
            service_account: self.config.service_account.as_deref(),
        }
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, EngineError> {
        let token = self.tokens.token(&self.client).await?;
        Ok(request.bearer_auth(token))
    }

    /// Poll a long-running operation until it reports `done`.
    async fn wait_for_operation(&self, mut operation: Operation) -> Result<(), EngineError> {
        let mut polls = 0;
        while !operation.done {
            if polls >= OPERATION_MAX_POLLS {
                return Err(EngineError::Operation(format!(
                    "operation {} did not complete",
                    operation.name
                )));
            }
            polls += 1;
            tokio::time::sleep(OPERATION_POLL_INTERVAL).await;

            let request = self
                .authorized(self.client.get(format!("{WORKFLOWS_API}/{}", operation.name)))
                .await?;
            operation = Self::parse_response(request.send().await?).await?;
        }

        match operation.error {
            Some(status) => Err(EngineError::Operation(format!(
                "{} (code {})",
                status.message, status.code
            ))),
            None => Ok(()),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. 404 becomes
    /// [`EngineError::NotFound`]; other failures carry status and body.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl WorkflowEngine for CloudWorkflowsClient {
    async fn create_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError> {
        let request = self
            .client
            .post(self.workflows_url())
            .query(&[("workflowId", workflow_id)])
            .json(&self.workflow_resource(source));
        let response = self.authorized(request).await?.send().await?;
        let operation: Operation = Self::parse_response(response).await?;

        self.wait_for_operation(operation).await?;
        tracing::info!(workflow_id, "Registered workflow with engine");
        Ok(())
    }

    async fn update_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError> {
        let mut mask = String::from("sourceContents,executionHistoryLevel");
        if self.config.service_account.is_some() {
            mask.push_str(",serviceAccount");
        }
        let request = self
            .client
            .patch(self.workflow_url(workflow_id))
            .query(&[("updateMask", mask.as_str())])
            .json(&self.workflow_resource(source));
        let response = self.authorized(request).await?.send().await?;
        let operation: Operation = Self::parse_response(response).await?;

        self.wait_for_operation(operation).await?;
        tracing::info!(workflow_id, "Updated workflow source in engine");
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), EngineError> {
        let request = self.client.delete(self.workflow_url(workflow_id));
        let response = self.authorized(request).await?.send().await?;
        let operation: Operation = Self::parse_response(response).await?;

        self.wait_for_operation(operation).await?;
        tracing::info!(workflow_id, "Deleted workflow from engine");
        Ok(())
    }

    async fn create_execution(
        &self,
        workflow_id: &str,
        argument: &serde_json::Value,
    ) -> Result<RemoteExecution, EngineError> {
        let body = CreateExecution {
            argument: serde_json::to_string(argument)
                .map_err(|e| EngineError::InvalidResponse(e.to_string()))?,
        };
        let request = self.client.post(self.executions_url(workflow_id)).json(&body);
        let response = self.authorized(request).await?.send().await?;
        let execution: Execution = Self::parse_response(response).await?;
        Ok(execution.into())
    }

    async fn get_execution(
        &self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Result<Option<RemoteExecution>, EngineError> {
        let request = self.client.get(self.execution_url(workflow_id, execution_id));
        let response = self.authorized(request).await?.send().await?;
        match Self::parse_response::<Execution>(response).await {
            Ok(execution) => Ok(Some(execution.into())),
            Err(EngineError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_step_entries(
        &self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Result<Vec<StepLogEntry>, EngineError> {
        let url = format!("{}/stepEntries", self.execution_url(workflow_id, execution_id));
        let page_size = STEP_ENTRIES_PAGE_SIZE.to_string();
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("view", "EXECUTION_ENTRY_VIEW_DETAILED"),
                ("pageSize", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let request = self.client.get(url.as_str()).query(&query);
            let response = self.authorized(request).await?.send().await?;
            let page: ListStepEntries = Self::parse_response(response).await?;

            entries.extend(page.step_entries.into_iter().map(StepLogEntry::from));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
        page_size: i64,
        page_token: Option<&str>,
        filter: Option<&str>,
    ) -> Result<ExecutionPage, EngineError> {
        let page_size = page_size.to_string();
        let mut query = vec![("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        if let Some(filter) = filter {
            query.push(("filter", filter));
        }

        let request = self.client.get(self.executions_url(workflow_id)).query(&query);
        let response = self.authorized(request).await?.send().await?;
        let list: ListExecutions = Self::parse_response(response).await?;
        Ok(list.into())
    }
}
