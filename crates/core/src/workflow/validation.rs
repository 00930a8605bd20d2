//! Save-time validation of a workflow's step graph.
//!
//! Step ids become engine variable names (`<step_id>_result`) and user-input
//! output names become engine parameters, so both must be plain identifiers.
//! References may only point backwards; this keeps the graph acyclic and lets
//! the trace reconstructor resolve inputs in a single forward pass.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use validator::Validate;

use crate::error::CoreError;

use super::compiler::AUTH_HEADER_PARAM;
use super::definition::WorkflowDefinition;
use super::step::StepKind;
use super::trace::TERMINAL_STEP;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

/// Validate a workflow definition, returning the first problem found.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), CoreError> {
    def.validate()
        .map_err(|e| CoreError::Validation(format!("Invalid workflow: {e}")))?;
    if def.name.trim().is_empty() {
        return Err(CoreError::Validation("Workflow name must not be blank".into()));
    }

    // step_id -> position
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, step) in def.steps.iter().enumerate() {
        let id = step.step_id.as_str();
        if !is_identifier(id) {
            return Err(CoreError::Validation(format!(
                "Invalid step id '{id}': must start with a letter or underscore and contain only letters, digits and underscores"
            )));
        }
        if id == TERMINAL_STEP {
            return Err(CoreError::Validation(format!("Step id '{id}' is reserved")));
        }
        if positions.insert(id, index).is_some() {
            return Err(CoreError::Validation(format!("Duplicate step id '{id}'")));
        }
        if step.kind() == StepKind::UserInput && index != 0 {
            return Err(CoreError::Validation(format!(
                "User input step '{id}' must be the first step"
            )));
        }
    }

    let user_input = def.user_input_step();
    let mut parameters: HashSet<&str> = HashSet::new();
    if let Some(step) = user_input {
        for name in step.outputs.keys() {
            if !is_identifier(name) {
                return Err(CoreError::Validation(format!(
                    "Invalid user input name '{name}'"
                )));
            }
            if name == AUTH_HEADER_PARAM {
                return Err(CoreError::Validation(format!(
                    "User input name '{name}' is reserved"
                )));
            }
            parameters.insert(name.as_str());
        }
    }

    for (index, step) in def.steps.iter().enumerate() {
        for (field, value) in step.inputs() {
            for reference in value.references() {
                let target = reference.step.as_str();
                let Some(&target_index) = positions.get(target) else {
                    return Err(CoreError::Validation(format!(
                        "Step '{}' input '{field}' references unknown step '{target}'",
                        step.step_id
                    )));
                };
                if target_index == index {
                    return Err(CoreError::Validation(format!(
                        "Step '{}' input '{field}' references itself",
                        step.step_id
                    )));
                }
                if target_index > index {
                    return Err(CoreError::Validation(format!(
                        "Step '{}' input '{field}' references later step '{target}'",
                        step.step_id
                    )));
                }
                if !is_identifier(&reference.output) {
                    return Err(CoreError::Validation(format!(
                        "Step '{}' input '{field}' references invalid output name '{}'",
                        step.step_id, reference.output
                    )));
                }
                let targets_user_input = user_input.is_some_and(|u| u.step_id == target);
                if targets_user_input && !parameters.contains(reference.output.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "Step '{}' input '{field}' references undeclared user input '{}'",
                        step.step_id, reference.output
                    )));
                }
            }
        }
    }

    Ok(())
}
