//! Orchestrator behaviour against the in-memory store and scripted engine:
//! registration rollback, run snapshots, batch ingestion, trace
//! reconstruction and lazy reconciliation.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::{json, Map, Value};
use studio_api::error::AppError;
use studio_api::query::ExecutionListParams;
use studio_core::error::CoreError;
use studio_core::workflow::batch::{BatchExecutionRequest, BatchItemStatus};
use studio_core::workflow::execution::{
    ExecutionPage, ExecutionState, RemoteExecution, StepEntryState, StepLogEntry,
};
use studio_core::workflow::{WorkflowDefinition, WorkflowRunStatus};

use common::{admin_caller, build_test_app, execution_name, sample_definition};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn log_entry(step: &str, body: Value) -> StepLogEntry {
    let mut variables = Map::new();
    variables.insert(format!("{step}_result"), json!({ "body": body }));
    StepLogEntry {
        step: step.to_string(),
        state: StepEntryState::Succeeded,
        create_time: Some(Utc::now()),
        update_time: Some(Utc::now()),
        variables,
    }
}

fn terminal_entry() -> StepLogEntry {
    StepLogEntry {
        step: "end".to_string(),
        state: StepEntryState::Succeeded,
        create_time: None,
        update_time: None,
        variables: Map::new(),
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_persists_and_registers() {
    let app = build_test_app();

    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    assert!(workflow.id.starts_with("id-"));
    assert_eq!(workflow.user_id, 7);
    assert!(app.store.workflow(&workflow.id).is_some());
    let source = app.engine.source(&workflow.id).expect("registered with engine");
    assert!(source.contains("workflows-executor/generate_image"));
}

#[tokio::test]
async fn create_rolls_back_when_registration_fails() {
    let app = build_test_app();
    app.engine.fail_create_workflow.store(true, Ordering::SeqCst);

    let result = app.orchestrator.create(sample_definition(), 7).await;

    assert_matches!(result, Err(AppError::Engine(_)));
    assert_eq!(app.store.workflow_count(), 0);
}

#[tokio::test]
async fn create_rejects_invalid_definition_before_persisting() {
    let app = build_test_app();
    let mut definition = sample_definition();
    definition.steps[2].step_id = "hero".into();

    let result = app.orchestrator.create(definition, 7).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
    assert_eq!(app.store.workflow_count(), 0);
}

#[tokio::test]
async fn update_checks_existence_then_ownership() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    let missing = app.orchestrator.update("id-nope", sample_definition(), 7).await;
    assert_matches!(missing, Err(AppError::Core(CoreError::NotFound { .. })));

    let foreign = app.orchestrator.update(&workflow.id, sample_definition(), 8).await;
    assert_matches!(foreign, Err(AppError::Core(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn update_leaves_row_untouched_when_engine_fails() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    app.engine.fail_update_workflow.store(true, Ordering::SeqCst);

    let mut renamed = sample_definition();
    renamed.name = "Renamed".into();
    let result = app.orchestrator.update(&workflow.id, renamed, 7).await;

    assert_matches!(result, Err(AppError::Engine(_)));
    assert_eq!(app.store.workflow(&workflow.id).unwrap().name, "Look book");
}

#[tokio::test]
async fn delete_tolerates_workflow_missing_from_engine() {
    let app = build_test_app();
    app.store.insert_workflow("id-local-only", 7, sample_definition());

    app.orchestrator.delete("id-local-only", 7).await.unwrap();

    assert!(app.store.workflow("id-local-only").is_none());
}

#[tokio::test]
async fn delete_of_foreign_workflow_is_not_found() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    let result = app.orchestrator.delete(&workflow.id, 8).await;

    assert_matches!(result, Err(AppError::Core(CoreError::NotFound { .. })));
    assert!(app.store.workflow(&workflow.id).is_some());
    assert!(app.engine.source(&workflow.id).is_some());
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_forwards_caller_header_and_records_snapshot() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let caller = admin_caller(7);

    let execution_id = app
        .orchestrator
        .execute(
            &workflow.id,
            args(json!({"subject": "a red dress", "style": "noir", "workspace_id": "5"})),
            &caller,
        )
        .await
        .unwrap();

    assert_eq!(execution_id, "exec-1");
    let sent = &app.engine.arguments()[0];
    assert_eq!(sent["user_auth_header"], caller.authorization);
    assert_eq!(sent["subject"], "a red dress");

    let run = app.store.run("exec-1").expect("run recorded");
    assert_eq!(run.status, WorkflowRunStatus::Running);
    assert_eq!(run.workspace_id, Some(5));
    assert_eq!(run.workflow_id, workflow.id);
    assert_eq!(run.workflow_snapshot["id"], workflow.id);
    assert_eq!(run.workflow_snapshot["name"], "Look book");
}

#[tokio::test]
async fn snapshot_keeps_declared_parameter_order() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    app.orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(7))
        .await
        .unwrap();

    let run = app.store.run("exec-1").expect("run recorded");
    let outputs: Vec<_> = run.workflow_snapshot["steps"][0]["outputs"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(outputs, vec!["subject", "style"]);

    let snapshot = run.snapshot().unwrap();
    let keys: Vec<_> = snapshot.definition.steps[0].outputs.keys().cloned().collect();
    assert_eq!(keys, vec!["subject", "style"]);
}

#[tokio::test]
async fn snapshot_failure_does_not_fail_execution() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    app.store.fail_create_run.store(true, Ordering::SeqCst);

    let execution_id = app
        .orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(7))
        .await
        .unwrap();

    assert_eq!(execution_id, "exec-1");
    assert!(app.store.run("exec-1").is_none());
}

#[tokio::test]
async fn execute_foreign_workflow_is_not_found() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    let result = app
        .orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(8))
        .await;

    assert_matches!(result, Err(AppError::Core(CoreError::NotFound { .. })));
    assert!(app.engine.arguments().is_empty());
}

#[tokio::test]
async fn batch_rows_fail_independently_and_share_ingested_assets() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let request: BatchExecutionRequest = serde_json::from_value(json!({
        "items": [
            {"row_index": 0, "args": {"workspace_id": 9, "subject": "one", "photo": "gs://bucket/a.png"}},
            {"row_index": 1, "args": {"subject": "two", "photo": "gs://bucket/b.png"}},
            {"row_index": 2, "args": {"workspace_id": "9", "subject": "three",
                                      "photos": ["gs://bucket/a.png", "gs://bucket/dir/c.jpg"]}}
        ]
    }))
    .unwrap();

    let response = app
        .orchestrator
        .batch_execute(&workflow.id, request, &admin_caller(7))
        .await
        .unwrap();

    let rows: Vec<_> = response.results.iter().map(|r| (r.row_index, r.status)).collect();
    assert_eq!(
        rows,
        vec![
            (0, BatchItemStatus::Success),
            (1, BatchItemStatus::Failed),
            (2, BatchItemStatus::Success),
        ]
    );
    let error = response.results[1].error.as_deref().unwrap();
    assert!(error.contains("'photo'"), "{error}");
    assert!(error.contains("no workspace_id"), "{error}");

    // a.png is ingested once and reused.
    assert_eq!(app.store.asset_count(), 2);

    let sent = app.engine.arguments();
    assert_eq!(sent.len(), 2);
    let single = sent.iter().find(|a| a["subject"] == "one").unwrap();
    let listed = sent.iter().find(|a| a["subject"] == "three").unwrap();
    assert_eq!(single["photo"]["previewUrl"], "gs://bucket/a.png");
    assert_eq!(listed["photos"][0]["sourceAssetId"], single["photo"]["sourceAssetId"]);
    assert_eq!(listed["photos"][1]["previewUrl"], "gs://bucket/dir/c.jpg");
    assert!(listed["user_auth_header"].as_str().unwrap().starts_with("Bearer "));
}

#[tokio::test]
async fn batch_reports_malformed_uri_per_row() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let request: BatchExecutionRequest = serde_json::from_value(json!({
        "items": [
            {"row_index": 4, "args": {"workspace_id": 1, "photo": "gs://bucket-only"}},
            {"row_index": 5, "args": {"workspace_id": 1, "photos": ["gs://b/x.png", 3]}}
        ]
    }))
    .unwrap();

    let response = app
        .orchestrator
        .batch_execute(&workflow.id, request, &admin_caller(7))
        .await
        .unwrap();

    assert!(response
        .results
        .iter()
        .all(|r| r.status == BatchItemStatus::Failed));
    assert!(app.engine.arguments().is_empty());
}

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trace_resolves_inputs_from_prior_outputs() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(
            &workflow.id,
            args(json!({"subject": "a hat", "style": "watercolor"})),
            &admin_caller(7),
        )
        .await
        .unwrap();
    app.engine.set_entries(
        &execution_id,
        vec![
            log_entry("hero", json!({"generated_image": 41})),
            log_entry("restyle", json!({"edited_image": 42})),
            terminal_entry(),
        ],
    );

    let trace = app
        .orchestrator
        .execution_trace(&workflow.id, &execution_id, 7)
        .await
        .unwrap();

    assert_eq!(trace.id, execution_id);
    let steps: Vec<_> = trace.step_entries.iter().map(|e| e.step_id.as_str()).collect();
    assert_eq!(steps, vec!["user_input", "hero", "restyle"]);
    assert_eq!(trace.step_entries[0].step_outputs["subject"], "a hat");
    assert_eq!(trace.step_entries[1].step_inputs["prompt"], "a hat");
    assert_eq!(trace.step_entries[2].step_inputs["input_images"], json!([41]));
    assert_eq!(trace.step_entries[2].step_inputs["prompt"], "watercolor");
    assert_eq!(trace.step_entries[2].step_outputs, json!({"edited_image": 42}));
}

#[tokio::test]
async fn reconciliation_happens_once() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(7))
        .await
        .unwrap();

    // Still running remotely: nothing to reconcile.
    app.orchestrator
        .execution_trace(&workflow.id, &execution_id, 7)
        .await
        .unwrap();
    assert_eq!(app.store.status_updates.load(Ordering::SeqCst), 0);

    app.engine.set_state(&execution_id, ExecutionState::Failed);
    for _ in 0..2 {
        let trace = app
            .orchestrator
            .execution_trace(&workflow.id, &execution_id, 7)
            .await
            .unwrap();
        assert_eq!(trace.state, ExecutionState::Failed);
    }

    assert_eq!(app.store.status_updates.load(Ordering::SeqCst), 1);
    let run = app.store.run(&execution_id).unwrap();
    assert_eq!(run.status, WorkflowRunStatus::Failed);
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn trace_uses_snapshot_over_edited_live_definition() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(&workflow.id, args(json!({"subject": "boots"})), &admin_caller(7))
        .await
        .unwrap();

    let mut edited = sample_definition();
    edited.steps.truncate(2);
    edited.name = "Edited".into();
    app.orchestrator.update(&workflow.id, edited, 7).await.unwrap();
    app.engine.set_entries(
        &execution_id,
        vec![
            log_entry("hero", json!({"generated_image": 1})),
            log_entry("restyle", json!({"edited_image": 2})),
        ],
    );

    let trace = app
        .orchestrator
        .execution_trace(&workflow.id, &execution_id, 7)
        .await
        .unwrap();

    assert_eq!(trace.step_entries.len(), 3);
    assert_eq!(trace.workflow_definition.unwrap().name, "Look book");
}

#[tokio::test]
async fn unreadable_snapshot_falls_back_to_live_definition() {
    let app = build_test_app();
    app.store.insert_workflow("id-legacy", 7, sample_definition());
    app.store.insert_run(
        "legacy-1",
        "id-legacy",
        7,
        WorkflowRunStatus::Completed,
        json!("not a snapshot"),
    );
    app.engine.put_execution(RemoteExecution {
        name: execution_name("id-legacy", "legacy-1"),
        state: ExecutionState::Succeeded,
        argument: Some(r#"{"subject":"scarf"}"#.into()),
        result: Some(r#""done""#.into()),
        error: None,
        start_time: Some(Utc::now()),
        end_time: Some(Utc::now()),
    });
    app.engine
        .set_entries("legacy-1", vec![log_entry("hero", json!({"generated_image": 9}))]);

    let trace = app
        .orchestrator
        .execution_trace("id-legacy", "legacy-1", 7)
        .await
        .unwrap();

    assert_eq!(trace.result, Some(json!("done")));
    assert_eq!(trace.step_entries.len(), 2);
    assert_eq!(trace.step_entries[1].step_inputs["prompt"], "scarf");
    // Completed runs are never rewritten.
    assert_eq!(app.store.status_updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trace_survives_deleted_workflow_via_run_owner() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(7))
        .await
        .unwrap();
    app.orchestrator.delete(&workflow.id, 7).await.unwrap();

    let trace = app
        .orchestrator
        .execution_trace(&workflow.id, &execution_id, 7)
        .await
        .unwrap();
    assert_eq!(
        trace.workflow_definition.map(|d: WorkflowDefinition| d.name),
        Some("Look book".to_string())
    );

    let foreign = app
        .orchestrator
        .execution_trace(&workflow.id, &execution_id, 8)
        .await;
    assert_matches!(foreign, Err(AppError::Core(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn trace_without_step_log_keeps_execution_fields() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(&workflow.id, Map::new(), &admin_caller(7))
        .await
        .unwrap();
    app.engine.fail_step_entries.store(true, Ordering::SeqCst);

    let trace = app
        .orchestrator
        .execution_trace(&workflow.id, &execution_id, 7)
        .await
        .unwrap();

    assert_eq!(trace.state, ExecutionState::Active);
    assert_eq!(trace.step_entries.len(), 1);
}

#[tokio::test]
async fn unknown_execution_is_not_found() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();

    let result = app
        .orchestrator
        .execution_trace(&workflow.id, "exec-404", 7)
        .await;

    assert_matches!(
        result,
        Err(AppError::Core(CoreError::NotFound { entity: "Execution", .. }))
    );
}

#[tokio::test]
async fn trace_rejects_execution_of_another_workflow() {
    let app = build_test_app();
    let mine = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let theirs = app.orchestrator.create(sample_definition(), 8).await.unwrap();
    let execution_id = app
        .orchestrator
        .execute(&theirs.id, args(json!({"subject": "secret subject"})), &admin_caller(8))
        .await
        .unwrap();

    for id in [execution_id.clone(), execution_name(&theirs.id, &execution_id)] {
        let result = app.orchestrator.execution_trace(&mine.id, &id, 7).await;
        assert_matches!(
            result,
            Err(AppError::Core(CoreError::NotFound { entity: "Execution", .. }))
        );
    }

    // The owner may still address it by full resource name.
    let trace = app
        .orchestrator
        .execution_trace(&theirs.id, &execution_name(&theirs.id, &execution_id), 8)
        .await
        .unwrap();
    assert_eq!(trace.id, execution_id);
    assert_eq!(trace.step_entries[0].step_outputs["subject"], "secret subject");
    assert!(trace.step_entries[0].step_outputs.get("user_auth_header").is_none());
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_executions_clamps_and_filters() {
    let app = build_test_app();
    let workflow = app.orchestrator.create(sample_definition(), 7).await.unwrap();
    let start = Utc::now() - chrono::Duration::seconds(90);
    app.engine.set_page(ExecutionPage {
        executions: vec![RemoteExecution {
            name: execution_name(&workflow.id, "abc"),
            state: ExecutionState::Succeeded,
            argument: None,
            result: None,
            error: None,
            start_time: Some(start),
            end_time: Some(start + chrono::Duration::milliseconds(1500)),
        }],
        next_page_token: Some("next".into()),
    });

    let page = app
        .orchestrator
        .list_executions(
            &workflow.id,
            7,
            ExecutionListParams {
                limit: Some(500),
                page_token: Some(String::new()),
                status: Some("succeeded".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        app.engine.last_listing(),
        Some((100, None, Some("state=\"SUCCEEDED\"".to_string())))
    );
    assert_eq!(page.next_page_token.as_deref(), Some("next"));
    assert_eq!(page.executions[0].id, "abc");
    assert_eq!(page.executions[0].duration, 1.5);

    let defaults = app
        .orchestrator
        .list_executions(&workflow.id, 7, ExecutionListParams::default())
        .await
        .unwrap();
    assert_eq!(defaults.executions.len(), 1);
    assert_eq!(app.engine.last_listing(), Some((10, None, None)));
}
