//! Workflow-executor façade.
//!
//! Compiled workflows POST each step to `/workflows-executor/{kind}`. The
//! façade turns the step into a generation job on the backend, waits for the
//! job to finish, and answers with the produced media id.

pub mod backend;
pub mod dto;
pub mod error;
pub mod media;
pub mod service;

pub use backend::BackendClient;
pub use error::ExecutorError;
pub use service::ExecutorService;
