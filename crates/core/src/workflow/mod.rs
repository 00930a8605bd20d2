//! Workflow graph model, compilation to engine source, and trace replay.

pub mod batch;
pub mod compiler;
pub mod definition;
pub mod execution;
pub mod step;
pub mod trace;
pub mod validation;

pub use compiler::{compile, CompiledWorkflow};
pub use definition::{WorkflowDefinition, WorkflowRunStatus, WorkflowSnapshot};
pub use execution::{ExecutionState, RemoteExecution, StepLogEntry};
pub use step::{InputValue, Step, StepDefinition, StepKind, StepStatus};
pub use trace::{reconstruct_trace, ExecutionTrace};
pub use validation::validate_definition;
