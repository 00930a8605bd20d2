//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and the create DTO the repository inserts from.

pub mod source_asset;
pub mod workflow;
pub mod workflow_run;
