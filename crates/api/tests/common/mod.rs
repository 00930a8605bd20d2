//! Shared harness for the API integration tests.
//!
//! The router runs against an in-memory [`Store`] and a scripted
//! [`WorkflowEngine`], so no database or cloud project is needed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use jsonwebtoken::{encode, EncodingKey, Header};
use studio_api::auth::jwt::{Claims, JwtConfig};
use studio_api::config::{ExecutorConfig, ServerConfig};
use studio_api::executor::{BackendClient, ExecutorService};
use studio_api::middleware::auth::AuthUser;
use studio_api::router::build_app_router;
use studio_api::state::AppState;
use studio_api::workflows::WorkflowOrchestrator;
use studio_core::roles::ROLE_ADMIN;
use studio_core::types::{DbId, Timestamp};
use studio_core::workflow::execution::{
    ExecutionPage, ExecutionState, RemoteExecution, StepLogEntry,
};
use studio_core::workflow::{WorkflowDefinition, WorkflowRunStatus};
use studio_db::models::source_asset::{CreateSourceAsset, SourceAsset};
use studio_db::models::workflow::{CreateWorkflow, Workflow, WorkflowPage};
use studio_db::models::workflow_run::{CreateWorkflowRun, WorkflowRun};
use studio_db::Store;
use studio_engine::{EngineError, WorkflowEngine};

pub const EXECUTOR_URL: &str = "http://executor.test/api/v1/workflows-executor";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    workflows: HashMap<String, Workflow>,
    runs: HashMap<String, WorkflowRun>,
    /// Keyed by storage URI.
    assets: HashMap<String, SourceAsset>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    next_asset_id: AtomicI64,
    pub fail_ping: AtomicBool,
    pub fail_create_run: AtomicBool,
    /// Number of `update_run_status` calls that changed a row.
    pub status_updates: AtomicUsize,
}

impl MemoryStore {
    pub fn workflow(&self, id: &str) -> Option<Workflow> {
        self.state.lock().unwrap().workflows.get(id).cloned()
    }

    pub fn workflow_count(&self) -> usize {
        self.state.lock().unwrap().workflows.len()
    }

    pub fn run(&self, id: &str) -> Option<WorkflowRun> {
        self.state.lock().unwrap().runs.get(id).cloned()
    }

    pub fn asset_count(&self) -> usize {
        self.state.lock().unwrap().assets.len()
    }

    /// Insert a workflow row directly, bypassing the engine.
    pub fn insert_workflow(&self, id: &str, user_id: DbId, definition: WorkflowDefinition) {
        let now = Utc::now();
        let workflow = Workflow {
            id: id.to_string(),
            user_id,
            name: definition.name,
            description: definition.description,
            steps: definition.steps,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .workflows
            .insert(id.to_string(), workflow);
    }

    /// Insert a run row directly with an arbitrary snapshot blob.
    pub fn insert_run(
        &self,
        id: &str,
        workflow_id: &str,
        user_id: DbId,
        status: WorkflowRunStatus,
        snapshot: Value,
    ) {
        let now = Utc::now();
        let run = WorkflowRun {
            id: id.to_string(),
            workflow_id: workflow_id.to_string(),
            user_id,
            workspace_id: None,
            status,
            started_at: now,
            completed_at: None,
            workflow_snapshot: snapshot,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().runs.insert(id.to_string(), run);
    }
}

fn store_failure(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("simulated {what} failure"))
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(store_failure("ping"));
        }
        Ok(())
    }

    async fn create_workflow(&self, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        self.insert_workflow(&input.id, input.user_id, input.definition.clone());
        Ok(self.workflow(&input.id).expect("just inserted"))
    }

    async fn find_workflow(&self, id: &str) -> Result<Option<Workflow>, sqlx::Error> {
        Ok(self.workflow(id))
    }

    async fn search_workflows(
        &self,
        user_id: DbId,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<WorkflowPage, sqlx::Error> {
        let needle = name.map(str::to_lowercase);
        let mut matching: Vec<Workflow> = self
            .state
            .lock()
            .unwrap()
            .workflows
            .values()
            .filter(|w| w.user_id == user_id)
            .filter(|w| {
                needle
                    .as_deref()
                    .map_or(true, |n| w.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(WorkflowPage { items, total })
    }

    async fn replace_workflow(
        &self,
        id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(workflow) = state.workflows.get_mut(id) else {
            return Ok(None);
        };
        workflow.name = definition.name.clone();
        workflow.description = definition.description.clone();
        workflow.steps = definition.steps.clone();
        workflow.updated_at = Utc::now();
        Ok(Some(workflow.clone()))
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, sqlx::Error> {
        Ok(self.state.lock().unwrap().workflows.remove(id).is_some())
    }

    async fn create_run(&self, input: &CreateWorkflowRun) -> Result<WorkflowRun, sqlx::Error> {
        if self.fail_create_run.load(Ordering::SeqCst) {
            return Err(store_failure("create_run"));
        }
        let now = Utc::now();
        let run = WorkflowRun {
            id: input.id.clone(),
            workflow_id: input.workflow_id.clone(),
            user_id: input.user_id,
            workspace_id: input.workspace_id,
            status: input.status,
            started_at: input.started_at,
            completed_at: None,
            workflow_snapshot: input.workflow_snapshot.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .runs
            .insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn find_run(&self, id: &str) -> Result<Option<WorkflowRun>, sqlx::Error> {
        Ok(self.run(id))
    }

    async fn update_run_status(
        &self,
        id: &str,
        status: WorkflowRunStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(run) = state.runs.get_mut(id) else {
            return Ok(false);
        };
        run.status = status;
        run.completed_at = completed_at;
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn upsert_source_asset(
        &self,
        input: &CreateSourceAsset,
    ) -> Result<SourceAsset, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.assets.get(&input.gcs_uri) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let asset = SourceAsset {
            id: self.next_asset_id.fetch_add(1, Ordering::SeqCst) + 100,
            user_id: input.user_id,
            workspace_id: input.workspace_id,
            gcs_uri: input.gcs_uri.clone(),
            original_filename: input.original_filename.clone(),
            mime_type: input.mime_type.clone(),
            created_at: now,
            updated_at: now,
        };
        state.assets.insert(input.gcs_uri.clone(), asset.clone());
        Ok(asset)
    }
}

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EngineState {
    /// Workflow id -> compiled source.
    sources: HashMap<String, String>,
    /// Short execution id -> execution.
    executions: HashMap<String, RemoteExecution>,
    entries: HashMap<String, Vec<StepLogEntry>>,
    /// Arguments of every `create_execution`, in call order.
    arguments: Vec<Value>,
    /// `(page_size, page_token, filter)` of the last listing.
    last_listing: Option<(i64, Option<String>, Option<String>)>,
    page: ExecutionPage,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
    next_execution: AtomicUsize,
    pub fail_create_workflow: AtomicBool,
    pub fail_update_workflow: AtomicBool,
    pub fail_step_entries: AtomicBool,
}

impl FakeEngine {
    pub fn source(&self, workflow_id: &str) -> Option<String> {
        self.state.lock().unwrap().sources.get(workflow_id).cloned()
    }

    pub fn arguments(&self) -> Vec<Value> {
        self.state.lock().unwrap().arguments.clone()
    }

    pub fn last_listing(&self) -> Option<(i64, Option<String>, Option<String>)> {
        self.state.lock().unwrap().last_listing.clone()
    }

    pub fn set_page(&self, page: ExecutionPage) {
        self.state.lock().unwrap().page = page;
    }

    /// Register (or replace) an execution under its short id.
    pub fn put_execution(&self, execution: RemoteExecution) {
        let id = execution.id().to_string();
        self.state.lock().unwrap().executions.insert(id, execution);
    }

    pub fn set_state(&self, execution_id: &str, state: ExecutionState) {
        let mut guard = self.state.lock().unwrap();
        if let Some(execution) = guard.executions.get_mut(execution_id) {
            execution.state = state;
            execution.end_time = Some(Utc::now());
        }
    }

    pub fn set_entries(&self, execution_id: &str, entries: Vec<StepLogEntry>) {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(execution_id.to_string(), entries);
    }
}

pub fn execution_name(workflow_id: &str, execution_id: &str) -> String {
    format!("projects/test/locations/us-central1/workflows/{workflow_id}/executions/{execution_id}")
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn create_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError> {
        if self.fail_create_workflow.load(Ordering::SeqCst) {
            return Err(EngineError::Api {
                status: 500,
                body: "simulated registration failure".into(),
            });
        }
        self.state
            .lock()
            .unwrap()
            .sources
            .insert(workflow_id.to_string(), source.to_string());
        Ok(())
    }

    async fn update_workflow(&self, workflow_id: &str, source: &str) -> Result<(), EngineError> {
        if self.fail_update_workflow.load(Ordering::SeqCst) {
            return Err(EngineError::Operation("simulated update failure".into()));
        }
        self.state
            .lock()
            .unwrap()
            .sources
            .insert(workflow_id.to_string(), source.to_string());
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), EngineError> {
        match self.state.lock().unwrap().sources.remove(workflow_id) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(workflow_id.to_string())),
        }
    }

    async fn create_execution(
        &self,
        workflow_id: &str,
        argument: &Value,
    ) -> Result<RemoteExecution, EngineError> {
        let n = self.next_execution.fetch_add(1, Ordering::SeqCst) + 1;
        let execution = RemoteExecution {
            name: execution_name(workflow_id, &format!("exec-{n}")),
            state: ExecutionState::Active,
            argument: Some(argument.to_string()),
            result: None,
            error: None,
            start_time: Some(Utc::now()),
            end_time: None,
        };
        let mut state = self.state.lock().unwrap();
        state.arguments.push(argument.clone());
        state
            .executions
            .insert(execution.id().to_string(), execution.clone());
        Ok(execution)
    }

    async fn get_execution(
        &self,
        _workflow_id: &str,
        execution_id: &str,
    ) -> Result<Option<RemoteExecution>, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .executions
            .get(execution_id)
            .cloned())
    }

    async fn list_step_entries(
        &self,
        _workflow_id: &str,
        execution_id: &str,
    ) -> Result<Vec<StepLogEntry>, EngineError> {
        if self.fail_step_entries.load(Ordering::SeqCst) {
            return Err(EngineError::Operation("simulated history failure".into()));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .entries
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_executions(
        &self,
        _workflow_id: &str,
        page_size: i64,
        page_token: Option<&str>,
        filter: Option<&str>,
    ) -> Result<ExecutionPage, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.last_listing = Some((
            page_size,
            page_token.map(str::to_string),
            filter.map(str::to_string),
        ));
        Ok(state.page.clone())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub engine: Arc<FakeEngine>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
}

/// Build the full application router over fresh fakes.
///
/// The executor façade points at `executor_config`; tests that never call
/// it can use [`build_test_app`].
pub fn build_test_app_with_executor(executor_config: ExecutorConfig) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::default());
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        store.clone(),
        engine.clone(),
        EXECUTOR_URL,
    ));
    let backend = BackendClient::new(executor_config).expect("client builds");

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        workflows: orchestrator.clone(),
        executor: Arc::new(ExecutorService::new(backend)),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        engine,
        orchestrator,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_executor(ExecutorConfig::default())
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Sign a token the way the platform's auth service does.
pub fn token_for(user_id: DbId, role: &str) -> String {
    let jwt = test_config().jwt;
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: now + jwt.access_token_expiry_mins * 60,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .expect("token encodes")
}

pub fn admin_token(user_id: DbId) -> String {
    token_for(user_id, ROLE_ADMIN)
}

/// The caller as the extractor would build it from an admin token.
pub fn admin_caller(user_id: DbId) -> AuthUser {
    AuthUser {
        user_id,
        role: ROLE_ADMIN.to_string(),
        authorization: format!("Bearer {}", admin_token(user_id)),
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// User input feeding an image generation, feeding an edit.
pub fn sample_definition() -> WorkflowDefinition {
    serde_json::from_value(serde_json::json!({
        "name": "Look book",
        "description": "Hero shot and restyle",
        "steps": [
            {"type": "user_input", "step_id": "user_input", "outputs": {"subject": "", "style": ""}},
            {
                "type": "generate_image",
                "step_id": "hero",
                "inputs": {"prompt": {"step": "user_input", "output": "subject"}},
                "settings": {"model": "imagen", "brand_guidelines": false, "aspect_ratio": "1:1"}
            },
            {
                "type": "edit_image",
                "step_id": "restyle",
                "inputs": {
                    "input_images": [{"step": "hero", "output": "generated_image"}],
                    "prompt": {"step": "user_input", "output": "style"}
                },
                "settings": {"model": "imagen", "brand_guidelines": true, "aspect_ratio": "9:16"}
            }
        ]
    }))
    .expect("sample definition parses")
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, Method::GET, uri, token, None).await
}

pub async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Response {
    send(app, Method::POST, uri, token, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Response {
    send(app, Method::PUT, uri, token, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, Method::DELETE, uri, token, None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
