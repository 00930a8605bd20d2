//! Workflow lifecycle on top of the store and the remote engine.

pub mod dto;
pub mod orchestrator;

pub use orchestrator::WorkflowOrchestrator;
