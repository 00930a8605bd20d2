//! Engine-neutral view of remote executions and their step log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

use super::compiler::result_variable;
use super::definition::WorkflowRunStatus;

/// State of a remote execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Queued,
    Active,
    Succeeded,
    Failed,
    Cancelled,
    Unavailable,
    #[serde(rename = "STATE_UNSPECIFIED", other)]
    Unspecified,
}

impl ExecutionState {
    pub const ALL: [ExecutionState; 7] = [
        ExecutionState::Unspecified,
        ExecutionState::Queued,
        ExecutionState::Active,
        ExecutionState::Succeeded,
        ExecutionState::Failed,
        ExecutionState::Cancelled,
        ExecutionState::Unavailable,
    ];

    /// Look up a state by its engine name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionState::Unspecified => "STATE_UNSPECIFIED",
            ExecutionState::Queued => "QUEUED",
            ExecutionState::Active => "ACTIVE",
            ExecutionState::Succeeded => "SUCCEEDED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Cancelled => "CANCELLED",
            ExecutionState::Unavailable => "UNAVAILABLE",
        }
    }

    /// The local run status a terminal remote state maps to.
    pub fn terminal_run_status(self) -> Option<WorkflowRunStatus> {
        match self {
            ExecutionState::Succeeded => Some(WorkflowRunStatus::Completed),
            ExecutionState::Failed => Some(WorkflowRunStatus::Failed),
            ExecutionState::Cancelled => Some(WorkflowRunStatus::Canceled),
            _ => None,
        }
    }
}

/// State of one step-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepEntryState {
    #[serde(rename = "STATE_IN_PROGRESS")]
    InProgress,
    #[serde(rename = "STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "STATE_FAILED")]
    Failed,
    #[serde(rename = "STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "STATE_UNSPECIFIED", other)]
    Unspecified,
}

/// One remote execution as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteExecution {
    /// Full resource name, `projects/../workflows/<id>/executions/<execution_id>`.
    pub name: String,
    pub state: ExecutionState,
    /// JSON-encoded runtime argument.
    pub argument: Option<String>,
    /// JSON-encoded result, present once succeeded.
    pub result: Option<String>,
    pub error: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

impl RemoteExecution {
    pub fn id(&self) -> &str {
        short_execution_id(&self.name)
    }

    /// Whether the resource name places this execution under `workflow_id`.
    pub fn belongs_to(&self, workflow_id: &str) -> bool {
        let mut segments = self.name.rsplit('/').skip(1);
        segments.next() == Some("executions")
            && segments.next() == Some(workflow_id)
            && segments.next() == Some("workflows")
    }

    /// The runtime argument blob, or an empty object if absent or unparsable.
    pub fn arguments(&self) -> Value {
        self.argument
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// The result, decoded when it is JSON. Only reported once succeeded.
    pub fn decoded_result(&self) -> Option<Value> {
        if self.state != ExecutionState::Succeeded {
            return None;
        }
        self.result.as_deref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        })
    }

    /// Seconds from start to end, or to `now` while still running.
    pub fn duration_secs(&self, now: Timestamp) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let end = self.end_time.unwrap_or(now);
        round_duration((end - start).num_milliseconds() as f64 / 1000.0)
    }

    pub fn summary(&self, now: Timestamp) -> ExecutionSummary {
        ExecutionSummary {
            id: self.id().to_string(),
            state: self.state,
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration_secs(now),
            error: self.error.clone(),
        }
    }
}

/// One entry of an execution's step log.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLogEntry {
    pub step: String,
    pub state: StepEntryState,
    pub create_time: Option<Timestamp>,
    pub update_time: Option<Timestamp>,
    /// Engine variables visible at this step (detailed history only).
    pub variables: serde_json::Map<String, Value>,
}

impl StepLogEntry {
    /// Body of the HTTP response the step captured into `<step>_result`.
    pub fn captured_body(&self) -> Value {
        self.variables
            .get(&result_variable(&self.step))
            .and_then(|result| result.get("body"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

/// Row of the execution listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub id: String,
    pub state: ExecutionState,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub duration: f64,
    pub error: Option<String>,
}

/// One page of remote executions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPage {
    pub executions: Vec<RemoteExecution>,
    pub next_page_token: Option<String>,
}

/// Last path segment of an execution resource name.
pub fn short_execution_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

pub fn round_duration(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// New local status for a run, if the remote state should overwrite it.
///
/// Only a run still recorded as running is reconciled, and only against a
/// terminal remote state.
pub fn reconciled_status(
    local: WorkflowRunStatus,
    remote: ExecutionState,
) -> Option<WorkflowRunStatus> {
    if local != WorkflowRunStatus::Running {
        return None;
    }
    remote.terminal_run_status()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn execution(state: ExecutionState) -> RemoteExecution {
        RemoteExecution {
            name: "projects/p/locations/l/workflows/id-1/executions/abc-123".into(),
            state,
            argument: Some(r#"{"subject":"cat"}"#.into()),
            result: Some(r#"{"ok":true}"#.into()),
            error: None,
            start_time: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()),
            end_time: None,
        }
    }

    #[test]
    fn parses_state_names_case_insensitively() {
        assert_eq!(ExecutionState::parse("SUCCEEDED"), Some(ExecutionState::Succeeded));
        assert_eq!(ExecutionState::parse("cancelled"), Some(ExecutionState::Cancelled));
        assert_eq!(ExecutionState::parse("DONE"), None);
    }

    #[test]
    fn short_id_is_last_segment() {
        assert_eq!(execution(ExecutionState::Active).id(), "abc-123");
        assert_eq!(short_execution_id("plain"), "plain");
    }

    #[test]
    fn membership_is_read_from_resource_name() {
        let exec = execution(ExecutionState::Active);
        assert!(exec.belongs_to("id-1"));
        assert!(!exec.belongs_to("id-2"));
        assert!(!exec.belongs_to("1"));

        let bare = RemoteExecution { name: "abc-123".into(), ..exec };
        assert!(!bare.belongs_to("id-1"));
    }

    #[test]
    fn duration_uses_now_while_running() {
        let exec = execution(ExecutionState::Active);
        let now = exec.start_time.unwrap() + Duration::milliseconds(12_346);
        assert_eq!(exec.duration_secs(now), 12.35);

        let mut done = exec.clone();
        done.end_time = Some(done.start_time.unwrap() + Duration::seconds(3));
        assert_eq!(done.duration_secs(now), 3.0);
    }

    #[test]
    fn result_only_reported_on_success() {
        assert_eq!(execution(ExecutionState::Succeeded).decoded_result(), Some(json!({"ok": true})));
        assert_eq!(execution(ExecutionState::Failed).decoded_result(), None);
    }

    #[test]
    fn arguments_fall_back_to_empty_object() {
        let mut exec = execution(ExecutionState::Active);
        assert_eq!(exec.arguments(), json!({"subject": "cat"}));
        exec.argument = Some("not json".into());
        assert_eq!(exec.arguments(), json!({}));
        exec.argument = None;
        assert_eq!(exec.arguments(), json!({}));
    }

    #[test]
    fn reconciles_only_running_runs_to_terminal_states() {
        use WorkflowRunStatus::*;
        assert_eq!(reconciled_status(Running, ExecutionState::Succeeded), Some(Completed));
        assert_eq!(reconciled_status(Running, ExecutionState::Failed), Some(Failed));
        assert_eq!(reconciled_status(Running, ExecutionState::Cancelled), Some(Canceled));
        assert_eq!(reconciled_status(Running, ExecutionState::Active), None);
        assert_eq!(reconciled_status(Failed, ExecutionState::Failed), None);
    }

    #[test]
    fn unknown_states_deserialize_as_unspecified() {
        let state: ExecutionState = serde_json::from_value(json!("SOMETHING_NEW")).unwrap();
        assert_eq!(state, ExecutionState::Unspecified);
        let entry: StepEntryState = serde_json::from_value(json!("STATE_SUCCEEDED")).unwrap();
        assert_eq!(entry, StepEntryState::Succeeded);
        let entry: StepEntryState = serde_json::from_value(json!("STATE_SKIPPED")).unwrap();
        assert_eq!(entry, StepEntryState::Unspecified);
    }

    #[test]
    fn states_serialize_with_engine_names() {
        assert_eq!(serde_json::to_value(ExecutionState::Succeeded).unwrap(), json!("SUCCEEDED"));
        assert_eq!(
            serde_json::to_value(ExecutionState::Unspecified).unwrap(),
            json!("STATE_UNSPECIFIED")
        );
        assert_eq!(
            serde_json::to_value(StepEntryState::InProgress).unwrap(),
            json!("STATE_IN_PROGRESS")
        );
    }

    #[test]
    fn captured_body_reads_result_variable() {
        let mut variables = serde_json::Map::new();
        variables.insert("hero_result".into(), json!({"code": 200, "body": {"generated_image": 5}}));
        let entry = StepLogEntry {
            step: "hero".into(),
            state: StepEntryState::Succeeded,
            create_time: None,
            update_time: None,
            variables,
        };
        assert_eq!(entry.captured_body(), json!({"generated_image": 5}));

        let empty = StepLogEntry { step: "other".into(), ..entry };
        assert_eq!(empty.captured_body(), json!({}));
    }
}
