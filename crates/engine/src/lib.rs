//! Client for the remote workflow engine (Google Cloud Workflows).
//!
//! The backend talks to the engine only through the [`WorkflowEngine`] trait;
//! [`CloudWorkflowsClient`] is the production implementation.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod token;
pub mod wire;

pub use client::CloudWorkflowsClient;
pub use config::EngineConfig;
pub use engine::WorkflowEngine;
pub use error::EngineError;
