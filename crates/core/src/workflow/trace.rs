//! Rebuild a step-by-step execution trace from the engine's step log.
//!
//! The log only knows step names, states, and captured variables. Inputs are
//! recovered by replaying each step's declared references against the
//! outputs of the steps that ran before it.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::types::Timestamp;

use super::compiler::AUTH_HEADER_PARAM;
use super::definition::WorkflowDefinition;
use super::execution::{ExecutionState, RemoteExecution, StepEntryState, StepLogEntry};
use super::step::InputValue;

/// Sentinel the engine logs when the main block returns.
pub const TERMINAL_STEP: &str = "end";

/// Outputs produced so far, keyed by step id, in trace order.
pub type OutputEnvironment = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub step_id: String,
    pub state: StepEntryState,
    pub step_inputs: IndexMap<String, Value>,
    pub step_outputs: Value,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionTrace {
    pub id: String,
    pub state: ExecutionState,
    pub result: Option<Value>,
    pub duration: f64,
    pub error: Option<String>,
    pub step_entries: Vec<TraceEntry>,
    pub workflow_definition: Option<WorkflowDefinition>,
}

/// Resolve one input value against the outputs seen so far.
///
/// A reference to a step (or output) that has not produced anything yet
/// resolves to `null`.
pub fn resolve_input(value: &InputValue, env: &OutputEnvironment) -> Value {
    match value {
        InputValue::StepOutput(reference) => env
            .get(&reference.step)
            .and_then(|outputs| outputs.get(&reference.output))
            .cloned()
            .unwrap_or(Value::Null),
        InputValue::Sequence(items) => {
            Value::Array(items.iter().map(|item| resolve_input(item, env)).collect())
        }
        InputValue::Literal(_) | InputValue::Media(_) => value.to_json(),
    }
}

/// Merge an execution, its step log, and the definition it ran with.
///
/// Without a definition only execution-level fields are filled in. Log
/// entries for the terminal sentinel or for steps the definition does not
/// know are skipped.
pub fn reconstruct_trace(
    execution: &RemoteExecution,
    entries: &[StepLogEntry],
    definition: Option<&WorkflowDefinition>,
    now: Timestamp,
) -> ExecutionTrace {
    let mut trace = ExecutionTrace {
        id: execution.id().to_string(),
        state: execution.state,
        result: execution.decoded_result(),
        duration: execution.duration_secs(now),
        error: execution.error.clone(),
        step_entries: Vec::new(),
        workflow_definition: definition.cloned(),
    };
    let Some(definition) = definition else {
        return trace;
    };

    let mut env = OutputEnvironment::new();

    if let Some(user_input) = definition.user_input_step() {
        let mut arguments = execution.arguments();
        // The caller's bearer token rides along in the argument blob.
        if let Value::Object(map) = &mut arguments {
            map.retain(|key, _| key != AUTH_HEADER_PARAM);
        }
        env.insert(user_input.step_id.clone(), arguments.clone());
        trace.step_entries.push(TraceEntry {
            step_id: user_input.step_id.clone(),
            state: StepEntryState::Succeeded,
            step_inputs: IndexMap::new(),
            step_outputs: arguments,
            start_time: execution.start_time,
            end_time: execution.start_time,
        });
    }

    for entry in entries {
        if entry.step == TERMINAL_STEP {
            continue;
        }
        let Some(step) = definition.find_step(&entry.step) else {
            continue;
        };

        let step_inputs = step
            .inputs()
            .into_iter()
            .map(|(name, value)| (name.to_string(), resolve_input(value, &env)))
            .collect();
        let step_outputs = entry.captured_body();
        env.insert(step.step_id.clone(), step_outputs.clone());

        trace.step_entries.push(TraceEntry {
            step_id: step.step_id.clone(),
            state: entry.state,
            step_inputs,
            step_outputs,
            start_time: entry.create_time,
            end_time: entry.update_time,
        });
    }

    trace
}
