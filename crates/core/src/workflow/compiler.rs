//! Compile a step graph into Cloud Workflows source.
//!
//! Every non-input step becomes one `http.post` call to the executor service
//! at `<executor_url>/<kind>`, with its result captured as `<step_id>_result`.
//! The user-input step emits no call; its outputs become runtime arguments.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;

use super::definition::WorkflowDefinition;
use super::step::{InputValue, Step};
use super::validation::validate_definition;

/// Runtime argument carrying the caller's `Authorization` header.
pub const AUTH_HEADER_PARAM: &str = "user_auth_header";

/// Runtime argument carrying the caller's workspace id.
pub const WORKSPACE_ID_PARAM: &str = "workspace_id";

/// Name of the engine's single parameter bag.
const ARGS: &str = "args";

/// Engine variable holding a step's captured HTTP response.
pub fn result_variable(step_id: &str) -> String {
    format!("{step_id}_result")
}

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    /// Parameters the runtime argument bag is expected to carry, in order.
    pub parameters: Vec<String>,
    /// YAML source to register with the engine.
    pub source: String,
}

// ---------------------------------------------------------------------------
// Engine program shape
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Program {
    main: MainBlock,
}

#[derive(Serialize)]
struct MainBlock {
    params: Vec<&'static str>,
    steps: Vec<IndexMap<String, CallStep>>,
}

#[derive(Serialize)]
struct CallStep {
    call: &'static str,
    args: CallArgs,
    result: String,
}

#[derive(Serialize)]
struct CallArgs {
    url: String,
    headers: CallHeaders,
    body: CallBody,
}

#[derive(Serialize)]
struct CallHeaders {
    #[serde(rename = "Authorization")]
    authorization: String,
}

#[derive(Serialize)]
struct CallBody {
    workspace_id: String,
    inputs: IndexMap<&'static str, Value>,
    config: Value,
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile `def` against the executor service at `executor_url`.
///
/// The definition is validated first, so a graph with forward references or a
/// misplaced user-input step never reaches the engine.
pub fn compile(def: &WorkflowDefinition, executor_url: &str) -> Result<CompiledWorkflow, CoreError> {
    validate_definition(def)?;

    let executor_url = executor_url.trim_end_matches('/');
    let user_input = def.user_input_step();
    let user_input_id = user_input.map(|step| step.step_id.as_str());

    let mut parameters = vec![AUTH_HEADER_PARAM.to_string()];
    if let Some(step) = user_input {
        parameters.extend(step.outputs.keys().cloned());
    }

    let steps = def
        .steps
        .iter()
        .filter(|step| !step.is_user_input())
        .map(|step| {
            let mut entry = IndexMap::new();
            entry.insert(step.step_id.clone(), call_step(step, executor_url, user_input_id));
            entry
        })
        .collect();

    let program = Program {
        main: MainBlock {
            params: vec![ARGS],
            steps,
        },
    };
    let source = serde_yaml::to_string(&program)
        .map_err(|e| CoreError::Internal(format!("Failed to render workflow source: {e}")))?;

    Ok(CompiledWorkflow { parameters, source })
}

fn call_step(step: &Step, executor_url: &str, user_input_id: Option<&str>) -> CallStep {
    let inputs = step
        .inputs()
        .into_iter()
        .map(|(name, value)| (name, resolve_reference(value, user_input_id)))
        .collect();

    CallStep {
        call: "http.post",
        args: CallArgs {
            url: format!("{executor_url}/{}", step.kind()),
            headers: CallHeaders {
                authorization: expression(&format!("{ARGS}.{AUTH_HEADER_PARAM}")),
            },
            body: CallBody {
                workspace_id: expression(&format!("{ARGS}.{WORKSPACE_ID_PARAM}")),
                inputs,
                config: step.definition.settings_json(),
            },
        },
        result: result_variable(&step.step_id),
    }
}

/// Rewrite step-output references into engine expressions.
///
/// References to the user-input step read the parameter bag; references to
/// any other step read that step's captured response body.
pub fn resolve_reference(value: &InputValue, user_input_id: Option<&str>) -> Value {
    match value {
        InputValue::StepOutput(reference) => {
            if Some(reference.step.as_str()) == user_input_id {
                Value::String(expression(&format!("{ARGS}.{}", reference.output)))
            } else {
                Value::String(expression(&format!(
                    "{}.body.{}",
                    result_variable(&reference.step),
                    reference.output
                )))
            }
        }
        InputValue::Sequence(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_reference(item, user_input_id))
                .collect(),
        ),
        InputValue::Literal(_) | InputValue::Media(_) => value.to_json(),
    }
}

fn expression(path: &str) -> String {
    format!("${{{path}}}")
}
