//! Object-safe storage seam over the repositories.
//!
//! The API layer holds an `Arc<dyn Store>`; [`PgStore`] forwards to the
//! zero-sized repositories, and tests substitute an in-memory implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use studio_core::types::{DbId, Timestamp};
use studio_core::workflow::{WorkflowDefinition, WorkflowRunStatus};

use crate::models::source_asset::{CreateSourceAsset, SourceAsset};
use crate::models::workflow::{CreateWorkflow, Workflow, WorkflowPage};
use crate::models::workflow_run::{CreateWorkflowRun, WorkflowRun};
use crate::repositories::{SourceAssetRepo, WorkflowRepo, WorkflowRunRepo};

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;

    // -- workflows --
    async fn create_workflow(&self, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error>;
    async fn find_workflow(&self, id: &str) -> Result<Option<Workflow>, sqlx::Error>;
    async fn search_workflows(
        &self,
        user_id: DbId,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<WorkflowPage, sqlx::Error>;
    async fn replace_workflow(
        &self,
        id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<Option<Workflow>, sqlx::Error>;
    async fn delete_workflow(&self, id: &str) -> Result<bool, sqlx::Error>;

    // -- runs --
    async fn create_run(&self, input: &CreateWorkflowRun) -> Result<WorkflowRun, sqlx::Error>;
    async fn find_run(&self, id: &str) -> Result<Option<WorkflowRun>, sqlx::Error>;
    async fn update_run_status(
        &self,
        id: &str,
        status: WorkflowRunStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error>;

    // -- assets --
    async fn upsert_source_asset(
        &self,
        input: &CreateSourceAsset,
    ) -> Result<SourceAsset, sqlx::Error>;
}

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }

    async fn create_workflow(&self, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        WorkflowRepo::create(&self.pool, input).await
    }

    async fn find_workflow(&self, id: &str) -> Result<Option<Workflow>, sqlx::Error> {
        WorkflowRepo::find_by_id(&self.pool, id).await
    }

    async fn search_workflows(
        &self,
        user_id: DbId,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<WorkflowPage, sqlx::Error> {
        WorkflowRepo::search(&self.pool, user_id, name, limit, offset).await
    }

    async fn replace_workflow(
        &self,
        id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        WorkflowRepo::replace(&self.pool, id, definition).await
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, sqlx::Error> {
        WorkflowRepo::delete(&self.pool, id).await
    }

    async fn create_run(&self, input: &CreateWorkflowRun) -> Result<WorkflowRun, sqlx::Error> {
        WorkflowRunRepo::create(&self.pool, input).await
    }

    async fn find_run(&self, id: &str) -> Result<Option<WorkflowRun>, sqlx::Error> {
        WorkflowRunRepo::find_by_id(&self.pool, id).await
    }

    async fn update_run_status(
        &self,
        id: &str,
        status: WorkflowRunStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        WorkflowRunRepo::update_status(&self.pool, id, status, completed_at).await
    }

    async fn upsert_source_asset(
        &self,
        input: &CreateSourceAsset,
    ) -> Result<SourceAsset, sqlx::Error> {
        SourceAssetRepo::upsert_by_uri(&self.pool, input).await
    }
}
