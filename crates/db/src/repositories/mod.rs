//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod source_asset_repo;
pub mod workflow_repo;
pub mod workflow_run_repo;

pub use source_asset_repo::SourceAssetRepo;
pub use workflow_repo::WorkflowRepo;
pub use workflow_run_repo::WorkflowRunRepo;
