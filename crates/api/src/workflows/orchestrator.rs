//! Workflow lifecycle: definitions in the store, compiled programs and
//! executions in the remote engine.
//!
//! There is no transaction spanning the two. Creation compensates a failed
//! engine registration by deleting the local row; execution treats the
//! engine's acceptance as success and records the run snapshot best-effort.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};
use studio_core::error::CoreError;
use studio_core::search::{
    clamp_limit, clamp_offset, page_number, total_pages, DEFAULT_EXECUTION_PAGE_SIZE,
    DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT,
};
use studio_core::storage::{guess_mime_type, parse_storage_uri};
use studio_core::types::DbId;
use studio_core::workflow::batch::{
    classify_argument, ingested_media, parse_workspace_id, BatchArgument, BatchExecutionRequest,
    BatchExecutionResponse, BatchItem, BatchItemResult,
};
use studio_core::workflow::compiler::AUTH_HEADER_PARAM;
use studio_core::workflow::definition::new_workflow_id;
use studio_core::workflow::execution::{reconciled_status, short_execution_id};
use studio_core::workflow::trace::TERMINAL_STEP;
use studio_core::workflow::{
    compile, reconstruct_trace, ExecutionState, ExecutionTrace, RemoteExecution,
    WorkflowDefinition, WorkflowRunStatus,
};
use studio_db::models::source_asset::CreateSourceAsset;
use studio_db::models::workflow::{CreateWorkflow, Workflow};
use studio_db::models::workflow_run::{CreateWorkflowRun, WorkflowRun};
use studio_db::Store;
use studio_engine::WorkflowEngine;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::ExecutionListParams;
use crate::response::PaginatedResponse;

use super::dto::{ExecutionListResponse, WorkflowSearchRequest};

/// Coordinates the store and the engine for every workflow operation.
pub struct WorkflowOrchestrator {
    store: Arc<dyn Store>,
    engine: Arc<dyn WorkflowEngine>,
    /// Base URL compiled workflows call back into.
    executor_url: String,
}

/// Storage URIs of one batch argument, to be replaced by asset references.
enum Ingestion {
    One(String),
    Many(Vec<String>),
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<dyn WorkflowEngine>,
        executor_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            executor_url: executor_url.into(),
        }
    }

    // ---- definitions ----

    /// Persist a new workflow and register it with the engine.
    ///
    /// If registration fails the local row is deleted again and the engine
    /// error is returned.
    pub async fn create(
        &self,
        definition: WorkflowDefinition,
        user_id: DbId,
    ) -> AppResult<Workflow> {
        let compiled = compile(&definition, &self.executor_url)?;
        let id = new_workflow_id(Uuid::new_v4());

        let workflow = self
            .store
            .create_workflow(&CreateWorkflow {
                id: id.clone(),
                user_id,
                definition,
            })
            .await?;

        if let Err(err) = self.engine.create_workflow(&id, &compiled.source).await {
            tracing::error!(workflow_id = %id, error = %err, "Engine registration failed, rolling back");
            if let Err(rollback) = self.store.delete_workflow(&id).await {
                tracing::error!(workflow_id = %id, error = %rollback, "Rollback of workflow row failed");
            }
            return Err(err.into());
        }

        tracing::info!(workflow_id = %id, user_id, steps = workflow.steps.len(), "Created workflow");
        Ok(workflow)
    }

    /// A workflow owned by `user_id`. Someone else's workflow is reported
    /// as missing.
    pub async fn get(&self, id: &str, user_id: DbId) -> AppResult<Workflow> {
        self.store
            .find_workflow(id)
            .await?
            .filter(|workflow| workflow.user_id == user_id)
            .ok_or_else(|| CoreError::not_found("Workflow", id).into())
    }

    pub async fn search(
        &self,
        user_id: DbId,
        request: WorkflowSearchRequest,
    ) -> AppResult<PaginatedResponse<Workflow>> {
        let limit = clamp_limit(request.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
        let offset = clamp_offset(request.offset);
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let page = self
            .store
            .search_workflows(user_id, name, limit, offset)
            .await?;

        Ok(PaginatedResponse {
            count: page.total,
            page: page_number(offset, limit),
            page_size: limit,
            total_pages: total_pages(page.total, limit),
            data: page.items,
        })
    }

    /// Replace a workflow's definition, in the engine first.
    pub async fn update(
        &self,
        id: &str,
        definition: WorkflowDefinition,
        user_id: DbId,
    ) -> AppResult<Workflow> {
        let existing = self
            .store
            .find_workflow(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workflow", id))?;
        if existing.user_id != user_id {
            return Err(CoreError::Forbidden(
                "You do not have permission to update this workflow".into(),
            )
            .into());
        }

        let compiled = compile(&definition, &self.executor_url)?;
        self.engine.update_workflow(id, &compiled.source).await?;

        let updated = self
            .store
            .replace_workflow(id, &definition)
            .await?
            .ok_or_else(|| CoreError::not_found("Workflow", id))?;

        tracing::info!(workflow_id = %id, user_id, "Updated workflow");
        Ok(updated)
    }

    /// Deregister from the engine, then delete locally. A workflow the
    /// engine no longer knows is not an error. Runs keep their snapshots.
    pub async fn delete(&self, id: &str, user_id: DbId) -> AppResult<()> {
        self.get(id, user_id).await?;

        match self.engine.delete_workflow(id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::warn!(workflow_id = %id, "Workflow already absent from engine");
            }
            Err(err) => return Err(err.into()),
        }

        if !self.store.delete_workflow(id).await? {
            return Err(CoreError::not_found("Workflow", id).into());
        }

        tracing::info!(workflow_id = %id, user_id, "Deleted workflow");
        Ok(())
    }

    // ---- execution ----

    /// Start one run and return its execution id.
    pub async fn execute(
        &self,
        id: &str,
        args: Map<String, Value>,
        caller: &AuthUser,
    ) -> AppResult<String> {
        let workflow = self.get(id, caller.user_id).await?;
        self.trigger(&workflow, args, caller).await
    }

    /// Start one run per batch row. Rows run concurrently and fail
    /// independently; results come back in request order.
    pub async fn batch_execute(
        &self,
        id: &str,
        request: BatchExecutionRequest,
        caller: &AuthUser,
    ) -> AppResult<BatchExecutionResponse> {
        let workflow = self.get(id, caller.user_id).await?;
        let ingest_lock = Mutex::new(());

        let rows = request
            .items
            .into_iter()
            .map(|item| self.run_batch_row(&workflow, item, caller, &ingest_lock));
        let results = join_all(rows).await;

        let failed = results.iter().filter(|r| r.error.is_some()).count();
        tracing::info!(workflow_id = %id, rows = results.len(), failed, "Batch execution finished");
        Ok(BatchExecutionResponse { results })
    }

    async fn run_batch_row(
        &self,
        workflow: &Workflow,
        item: BatchItem,
        caller: &AuthUser,
        ingest_lock: &Mutex<()>,
    ) -> BatchItemResult {
        let row_index = item.row_index;

        let args = match self
            .prepare_batch_args(item.args, caller.user_id, ingest_lock)
            .await
        {
            Ok(args) => args,
            Err(message) => {
                tracing::warn!(workflow_id = %workflow.id, row_index, error = %message, "Batch row rejected");
                return BatchItemResult::failed(row_index, message);
            }
        };

        match self.trigger(workflow, args, caller).await {
            Ok(execution_id) => BatchItemResult::success(row_index, execution_id),
            Err(err) => {
                tracing::warn!(workflow_id = %workflow.id, row_index, error = %err, "Batch row failed");
                BatchItemResult::failed(row_index, err.to_string())
            }
        }
    }

    /// Replace storage URIs in a row's arguments with ingested asset
    /// references. Errors are the per-row failure message.
    async fn prepare_batch_args(
        &self,
        args: Map<String, Value>,
        user_id: DbId,
        ingest_lock: &Mutex<()>,
    ) -> Result<Map<String, Value>, String> {
        let workspace_id = parse_workspace_id(&args);
        let mut prepared = Map::with_capacity(args.len());

        for (key, value) in args {
            let ingestion = classify_argument(&value)
                .map(|arg| match arg {
                    BatchArgument::Plain => None,
                    BatchArgument::StorageUri(uri) => Some(Ingestion::One(uri.to_string())),
                    BatchArgument::StorageUriList(uris) => Some(Ingestion::Many(
                        uris.into_iter().map(str::to_string).collect(),
                    )),
                })
                .map_err(|e| format!("Invalid storage URI in '{key}': {e}"))?;

            let Some(ingestion) = ingestion else {
                prepared.insert(key, value);
                continue;
            };
            let Some(workspace_id) = workspace_id else {
                return Err(format!(
                    "Invalid storage URI in '{key}': no workspace_id provided for storage ingestion"
                ));
            };

            let replaced = match ingestion {
                Ingestion::One(uri) => self.ingest(&uri, workspace_id, user_id, ingest_lock).await,
                Ingestion::Many(uris) => {
                    self.ingest_all(&uris, workspace_id, user_id, ingest_lock)
                        .await
                }
            }
            .map_err(|e| format!("Invalid storage URI in '{key}': {e}"))?;

            prepared.insert(key, replaced);
        }

        Ok(prepared)
    }

    /// Record (or reuse) the asset for a storage URI. Store writes are
    /// serialized through `ingest_lock`.
    async fn ingest(
        &self,
        uri: &str,
        workspace_id: DbId,
        user_id: DbId,
        ingest_lock: &Mutex<()>,
    ) -> AppResult<Value> {
        let object = parse_storage_uri(uri)?;
        let input = CreateSourceAsset {
            user_id,
            workspace_id,
            gcs_uri: uri.to_string(),
            original_filename: object.file_name().to_string(),
            mime_type: guess_mime_type(object.file_name()).to_string(),
        };

        let asset = {
            let _guard = ingest_lock.lock().await;
            self.store.upsert_source_asset(&input).await?
        };
        tracing::debug!(asset_id = asset.id, uri, "Ingested storage object");
        Ok(ingested_media(asset.id, uri))
    }

    async fn ingest_all(
        &self,
        uris: &[String],
        workspace_id: DbId,
        user_id: DbId,
        ingest_lock: &Mutex<()>,
    ) -> AppResult<Value> {
        let mut items = Vec::with_capacity(uris.len());
        for uri in uris {
            items.push(self.ingest(uri, workspace_id, user_id, ingest_lock).await?);
        }
        Ok(Value::Array(items))
    }

    /// Start an execution, then snapshot the workflow under its id.
    ///
    /// The caller's `Authorization` header travels in the arguments so the
    /// compiled workflow can forward it to the executor.
    async fn trigger(
        &self,
        workflow: &Workflow,
        mut args: Map<String, Value>,
        caller: &AuthUser,
    ) -> AppResult<String> {
        args.insert(
            AUTH_HEADER_PARAM.to_string(),
            Value::String(caller.authorization.clone()),
        );
        let workspace_id = parse_workspace_id(&args);

        let execution = self
            .engine
            .create_execution(&workflow.id, &Value::Object(args))
            .await?;
        let execution_id = execution.id().to_string();
        tracing::info!(workflow_id = %workflow.id, %execution_id, user_id = caller.user_id, "Started execution");

        self.record_run(workflow, &execution_id, caller.user_id, workspace_id)
            .await;
        Ok(execution_id)
    }

    /// Best-effort: the execution is already running, so failures are only
    /// logged.
    async fn record_run(
        &self,
        workflow: &Workflow,
        execution_id: &str,
        user_id: DbId,
        workspace_id: Option<DbId>,
    ) {
        let snapshot = match serde_json::to_value(workflow.snapshot()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(%execution_id, error = %err, "Failed to serialize workflow snapshot");
                return;
            }
        };

        let run = CreateWorkflowRun {
            id: execution_id.to_string(),
            workflow_id: workflow.id.clone(),
            user_id,
            workspace_id,
            status: WorkflowRunStatus::Running,
            started_at: Utc::now(),
            workflow_snapshot: snapshot,
        };
        match self.store.create_run(&run).await {
            Ok(_) => tracing::debug!(%execution_id, "Recorded run snapshot"),
            Err(err) => {
                tracing::error!(%execution_id, error = %err, "Failed to record run snapshot");
            }
        }
    }

    // ---- traces ----

    /// Rebuild the step-by-step trace of one execution.
    ///
    /// Resolution uses the run's snapshot, or the live definition when there
    /// is none. A run still recorded as running is brought up to date with a
    /// terminal engine state on the way.
    ///
    /// `execution_id` is reduced to its last path segment, and the execution
    /// the engine returns must sit under `workflow_id`.
    pub async fn execution_trace(
        &self,
        workflow_id: &str,
        execution_id: &str,
        user_id: DbId,
    ) -> AppResult<ExecutionTrace> {
        let execution_id = short_execution_id(execution_id);
        if execution_id.is_empty() {
            return Err(CoreError::not_found("Execution", execution_id).into());
        }

        let live = self.store.find_workflow(workflow_id).await?;
        let run = self.find_run(workflow_id, execution_id).await;

        let owner = live
            .as_ref()
            .map(|w| w.user_id)
            .or_else(|| run.as_ref().map(|r| r.user_id));
        if owner != Some(user_id) {
            return Err(CoreError::not_found("Workflow", workflow_id).into());
        }

        let execution = self
            .engine
            .get_execution(workflow_id, execution_id)
            .await?
            .filter(|execution| execution.belongs_to(workflow_id))
            .ok_or_else(|| CoreError::not_found("Execution", execution_id))?;

        let entries = self
            .engine
            .list_step_entries(workflow_id, execution_id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(%workflow_id, %execution_id, error = %err, "Step log unavailable");
                Vec::new()
            });

        let definition = match run.as_ref().and_then(WorkflowRun::snapshot) {
            Some(snapshot) => Some(snapshot.definition),
            None => {
                tracing::debug!(%execution_id, "No run snapshot, resolving against live definition");
                live.as_ref().map(Workflow::definition)
            }
        };

        if let Some(run) = &run {
            self.reconcile(run, &execution).await;
        }

        if let Some(definition) = &definition {
            let unknown = entries
                .iter()
                .filter(|e| e.step != TERMINAL_STEP && definition.find_step(&e.step).is_none())
                .count();
            if unknown > 0 {
                tracing::warn!(%execution_id, unknown, "Step log names steps the definition lacks");
            }
        }

        Ok(reconstruct_trace(
            &execution,
            &entries,
            definition.as_ref(),
            Utc::now(),
        ))
    }

    /// The run recorded for an execution of this workflow, if readable.
    async fn find_run(&self, workflow_id: &str, execution_id: &str) -> Option<WorkflowRun> {
        match self.store.find_run(execution_id).await {
            Ok(run) => run.filter(|r| r.workflow_id == workflow_id),
            Err(err) => {
                tracing::warn!(%execution_id, error = %err, "Failed to load run record");
                None
            }
        }
    }

    async fn reconcile(&self, run: &WorkflowRun, execution: &RemoteExecution) {
        let Some(status) = reconciled_status(run.status, execution.state) else {
            return;
        };
        let completed_at = execution.end_time.unwrap_or_else(Utc::now);

        match self
            .store
            .update_run_status(&run.id, status, Some(completed_at))
            .await
        {
            Ok(_) => tracing::info!(run_id = %run.id, %status, "Reconciled run status"),
            Err(err) => {
                tracing::error!(run_id = %run.id, error = %err, "Failed to reconcile run status");
            }
        }
    }

    /// One page of a workflow's executions, newest first.
    pub async fn list_executions(
        &self,
        workflow_id: &str,
        user_id: DbId,
        params: ExecutionListParams,
    ) -> AppResult<ExecutionListResponse> {
        self.get(workflow_id, user_id).await?;

        let limit = clamp_limit(params.limit, DEFAULT_EXECUTION_PAGE_SIZE, MAX_SEARCH_LIMIT);
        let filter = execution_filter(params.status.as_deref())?;

        let page = self
            .engine
            .list_executions(
                workflow_id,
                limit,
                params.page_token.as_deref().filter(|t| !t.is_empty()),
                filter.as_deref(),
            )
            .await?;

        let now = Utc::now();
        Ok(ExecutionListResponse {
            executions: page.executions.iter().map(|e| e.summary(now)).collect(),
            next_page_token: page.next_page_token,
        })
    }
}

/// Engine filter for a `status` query value. `ALL` or nothing means no filter.
pub fn execution_filter(status: Option<&str>) -> AppResult<Option<String>> {
    let status = match status.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) if s.eq_ignore_ascii_case("ALL") => return Ok(None),
        Some(s) => s,
    };
    let state = ExecutionState::parse(status)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown execution status '{status}'")))?;
    Ok(Some(format!("state=\"{}\"", state.as_str())))
}
