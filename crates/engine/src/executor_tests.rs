//! Tests for the workflow execution engine.
//!
//! These tests use `MockTrigger` and the in-memory store, so nothing is
//! spawned and no network is touched.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use store::InMemoryStore;
use triggers::mock::MockTrigger;
use triggers::{TriggerRegistry, Variables};

use crate::{
    EngineError, ExecutionResult, ExecutionStatus, Workflow, WorkflowDraft, WorkflowEngine,
    WorkflowStatus, WorkflowStep, CANCELLED_MESSAGE,
};

fn engine_with(triggers: &[&MockTrigger]) -> Arc<WorkflowEngine> {
    let mut registry = TriggerRegistry::new();
    for trigger in triggers {
        registry.register((*trigger).clone());
    }
    Arc::new(WorkflowEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(registry),
    ))
}

/// Store a workflow whose steps run in the given order.
async fn create_chain(engine: &WorkflowEngine, steps: Vec<WorkflowStep>) -> Workflow {
    let draft = WorkflowDraft::from(Workflow::chain("test-linear", steps));
    engine.create_workflow(draft).await.expect("create")
}

fn spawn_run(
    engine: &Arc<WorkflowEngine>,
    id: &str,
) -> JoinHandle<Result<Vec<ExecutionResult>, EngineError>> {
    let engine = Arc::clone(engine);
    let id = id.to_owned();
    tokio::spawn(async move { engine.execute_workflow(&id, Variables::new()).await })
}

/// Yield until the run of `id` has reached a step.
async fn wait_until_running(engine: &WorkflowEngine, id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let reached_step = engine
                .active_executions()
                .iter()
                .any(|ctx| ctx.workflow_id == id && ctx.current_step_id.is_some());
            if reached_step {
                return;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("run never started");
}

fn step_ids(results: &[ExecutionResult]) -> Vec<&str> {
    results.iter().map(|r| r.step_id.as_str()).collect()
}

// ============================================================
// Traversal
// ============================================================

#[tokio::test]
async fn empty_workflow_returns_no_results() {
    let engine = engine_with(&[]);
    let wf = engine
        .create_workflow(WorkflowDraft {
            name: "empty".into(),
            ..WorkflowDraft::default()
        })
        .await
        .unwrap();

    let results = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert!(results.is_empty());
    assert!(engine.active_executions().is_empty());
}

#[tokio::test]
async fn successful_chain_runs_every_step_in_order() {
    let a = MockTrigger::returning("a", json!({ "step": 1 }));
    let b = MockTrigger::returning("b", json!({ "step": 2 }));
    let c = MockTrigger::returning("c", json!({ "step": 3 }));
    let engine = engine_with(&[&a, &b, &c]);

    // Map order must not matter; only the links do.
    let wf = create_chain(
        &engine,
        vec![
            WorkflowStep::new("z", "first", "a"),
            WorkflowStep::new("m", "second", "b"),
            WorkflowStep::new("a", "third", "c"),
        ],
    )
    .await;

    let results = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert_eq!(step_ids(&results), vec!["z", "m", "a"]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[2].result, Some(json!({ "step": 3 })));

    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 1);
}

#[tokio::test]
async fn failing_step_stops_the_chain() {
    let ok = MockTrigger::returning("ok", json!({ "ok": true }));
    let boom = MockTrigger::failing("boom", "something broke irreparably");
    let never = MockTrigger::returning("never", json!({ "should": "not run" }));
    let engine = engine_with(&[&ok, &boom, &never]);

    let wf = create_chain(
        &engine,
        vec![
            WorkflowStep::new("s1", "ok", "ok"),
            WorkflowStep::new("s2", "boom", "boom"),
            WorkflowStep::new("s3", "never", "never"),
        ],
    )
    .await;

    // A trigger failure resolves the call; it does not reject it.
    let results = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert_eq!(step_ids(&results), vec!["s1", "s2"]);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].error.as_deref(), Some("something broke irreparably"));
    assert_eq!(results[1].result, None);

    assert_eq!(never.call_count(), 0);
}

#[tokio::test]
async fn unregistered_trigger_is_a_step_failure() {
    let engine = engine_with(&[]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "lost", "vanished")]).await;

    let results = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].error.as_deref(),
        Some("Trigger vanished is not registered")
    );
}

// ============================================================
// Variables
// ============================================================

#[tokio::test]
async fn results_are_threaded_to_later_steps() {
    let t1 = MockTrigger::returning("T1", json!({ "y": 2 }));
    let t2 = MockTrigger::reading("T2", "/s1_result/y");
    let engine = engine_with(&[&t1, &t2]);

    let wf = create_chain(
        &engine,
        vec![
            WorkflowStep::new("s1", "s1", "T1").param("x", json!(1)),
            WorkflowStep::new("s2", "s2", "T2"),
        ],
    )
    .await;

    let results = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].step_id, "s1");
    assert_eq!(results[0].result, Some(json!({ "y": 2 })));
    assert_eq!(results[1].step_id, "s2");
    assert_eq!(results[1].result, Some(json!(2)));

    // The first step saw its own params and no upstream results.
    let first_call = &t1.calls()[0];
    assert_eq!(first_call.params, json!({ "x": 1 }));
    assert!(first_call.variables.is_empty());
}

#[tokio::test]
async fn initial_variables_reach_the_first_step_unaliased() {
    let probe = MockTrigger::reading("probe", "/customer");
    let engine = engine_with(&[&probe]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "lookup", "probe")]).await;

    let mut initial = Variables::new();
    initial.insert("customer".into(), json!("ada"));
    let results = engine.execute_workflow(&wf.id, initial.clone()).await.unwrap();

    assert_eq!(results[0].result, Some(json!("ada")));
    assert_eq!(initial.len(), 1);
}

// ============================================================
// Structural errors
// ============================================================

#[tokio::test]
async fn unknown_workflow_is_rejected() {
    let engine = engine_with(&[]);
    let err = engine
        .execute_workflow("missing", Variables::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Workflow not found");
}

#[tokio::test]
async fn dangling_link_aborts_the_run_but_keeps_earlier_results() {
    let ok = MockTrigger::returning("ok", json!(1));
    let engine = engine_with(&[&ok]);

    let mut wf = Workflow::chain("broken", vec![WorkflowStep::new("s1", "one", "ok")]);
    wf.steps.get_mut("s1").unwrap().next_step_id = Some("ghost".into());
    let wf = engine.create_workflow(wf.into()).await.unwrap();

    let err = engine
        .execute_workflow(&wf.id, Variables::new())
        .await
        .unwrap_err();
    assert!(matches!(&err, EngineError::StepNotFound(id) if id == "ghost"));
    assert_eq!(err.to_string(), "Step ghost not found");

    // No entry for the missing step, and the slot was released.
    let history = engine.execution_history(&wf.id).await.unwrap();
    assert_eq!(step_ids(&history), vec!["s1"]);
    assert!(engine.active_executions().is_empty());
}

#[tokio::test]
async fn cyclic_chain_is_stopped() {
    let ok = MockTrigger::returning("ok", json!(1));
    let engine = engine_with(&[&ok]);

    let mut wf = Workflow::chain(
        "loop",
        vec![WorkflowStep::new("a", "a", "ok"), WorkflowStep::new("b", "b", "ok")],
    );
    wf.steps.insert("b".into(), WorkflowStep::new("b", "b", "ok").then("a"));
    let wf = engine.create_workflow(wf.into()).await.unwrap();

    let err = engine
        .execute_workflow(&wf.id, Variables::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CycleDetected(id) if id == "a"));
    assert_eq!(ok.call_count(), 2);
}

// ============================================================
// Single-flight
// ============================================================

#[tokio::test]
async fn second_run_is_rejected_while_first_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let slow = MockTrigger::gated("slow", Arc::clone(&gate), json!("done"));
    let engine = engine_with(&[&slow]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "slow")]).await;

    let first = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;

    let err = engine
        .execute_workflow(&wf.id, Variables::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.to_string(), "Workflow already running");

    gate.notify_one();
    let results = first.await.unwrap().unwrap();
    assert_eq!(results.len(), 1);
    assert!(engine.active_executions().is_empty());

    // The slot is free again.
    gate.notify_one();
    let again = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert!(again[0].success);
    assert_eq!(slow.call_count(), 2);
}

#[tokio::test]
async fn different_workflows_run_side_by_side() {
    let gate = Arc::new(Notify::new());
    let slow = MockTrigger::gated("slow", Arc::clone(&gate), json!(null));
    let fast = MockTrigger::returning("fast", json!(1));
    let engine = engine_with(&[&slow, &fast]);

    let blocked = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "slow")]).await;
    let other = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "fast")]).await;

    let first = spawn_run(&engine, &blocked.id);
    wait_until_running(&engine, &blocked.id).await;

    let results = engine.execute_workflow(&other.id, Variables::new()).await.unwrap();
    assert!(results[0].success);

    let active = engine.active_executions();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].workflow_id, blocked.id);
    assert_eq!(active[0].current_step_id.as_deref(), Some("s1"));

    gate.notify_one();
    first.await.unwrap().unwrap();
}

// ============================================================
// Cancellation
// ============================================================

#[tokio::test]
async fn cancelling_an_idle_workflow_is_a_no_op() {
    let engine = engine_with(&[]);
    assert!(!engine.cancel_execution("nothing-running"));
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_step() {
    let gate = Arc::new(Notify::new());
    let slow = MockTrigger::gated("slow", Arc::clone(&gate), json!(1));
    let after = MockTrigger::returning("after", json!(2));
    let engine = engine_with(&[&slow, &after]);
    let wf = create_chain(
        &engine,
        vec![
            WorkflowStep::new("s1", "s1", "slow"),
            WorkflowStep::new("s2", "s2", "after"),
        ],
    )
    .await;

    let run = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;

    assert!(engine.cancel_execution(&wf.id));
    assert!(engine.active_executions().is_empty());

    gate.notify_one();
    let results = run.await.unwrap().unwrap();
    assert_eq!(step_ids(&results), vec!["s1", "s2"]);
    assert!(results[0].success);
    let last = results.last().unwrap();
    assert!(!last.success);
    assert_eq!(last.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(after.call_count(), 0);
}

#[tokio::test]
async fn cancelling_during_the_last_step_is_still_reported() {
    let gate = Arc::new(Notify::new());
    let slow = MockTrigger::gated("slow", Arc::clone(&gate), json!(1));
    let engine = engine_with(&[&slow]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "slow")]).await;

    let run = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;
    assert!(engine.cancel_execution(&wf.id));

    gate.notify_one();
    let results = run.await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results.last().unwrap().error.as_deref(),
        Some(CANCELLED_MESSAGE)
    );

    let history = engine.execution_history(&wf.id).await.unwrap();
    assert_eq!(history, results);
}

#[tokio::test]
async fn cancel_still_closes_a_run_whose_step_then_fails() {
    let gate = Arc::new(Notify::new());
    let flaky = MockTrigger::gated_failing("flaky", Arc::clone(&gate), "upstream 500");
    let engine = engine_with(&[&flaky]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "flaky")]).await;

    let run = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;
    assert!(engine.cancel_execution(&wf.id));

    gate.notify_one();
    let results = run.await.unwrap().unwrap();
    assert_eq!(step_ids(&results), vec!["s1", "s1"]);
    assert_eq!(results[0].error.as_deref(), Some("upstream 500"));
    let last = results.last().unwrap();
    assert!(!last.success);
    assert_eq!(last.error.as_deref(), Some(CANCELLED_MESSAGE));
}

#[tokio::test]
async fn cancelled_run_leaves_a_newer_run_of_the_same_workflow_alone() {
    let first_gate = Arc::new(Notify::new());
    let second_gate = Arc::new(Notify::new());
    let first = MockTrigger::gated("first", Arc::clone(&first_gate), json!("old"));
    let second = MockTrigger::gated("second", Arc::clone(&second_gate), json!("new"));
    let engine = engine_with(&[&first, &second]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "s1", "first")]).await;

    let old_run = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;
    assert!(engine.cancel_execution(&wf.id));

    // The next run picks up a definition gated on a different trigger.
    let mut draft = WorkflowDraft::from(wf.clone());
    draft.steps.insert("s1".into(), WorkflowStep::new("s1", "s1", "second"));
    engine.update_workflow(&wf.id, draft).await.unwrap().expect("workflow exists");

    let new_run = spawn_run(&engine, &wf.id);
    wait_until_running(&engine, &wf.id).await;

    first_gate.notify_one();
    let old_results = old_run.await.unwrap().unwrap();
    assert_eq!(
        old_results.last().unwrap().error.as_deref(),
        Some(CANCELLED_MESSAGE)
    );

    // The finished run neither removed nor rewrote the newer entry.
    let active = engine.active_executions();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].workflow_id, wf.id);
    assert_eq!(active[0].status, ExecutionStatus::Running);
    assert_eq!(active[0].current_step_id.as_deref(), Some("s1"));

    second_gate.notify_one();
    let new_results = new_run.await.unwrap().unwrap();
    assert_eq!(new_results.len(), 1);
    assert_eq!(new_results[0].result, Some(json!("new")));
    assert!(engine.active_executions().is_empty());

    let history = engine.execution_history(&wf.id).await.unwrap();
    let expected: Vec<ExecutionResult> = old_results.into_iter().chain(new_results).collect();
    assert_eq!(history, expected);
}

// ============================================================
// History and definitions
// ============================================================

#[tokio::test]
async fn history_accumulates_across_runs() {
    let ok = MockTrigger::returning("ok", json!(1));
    let engine = engine_with(&[&ok]);
    let wf = create_chain(
        &engine,
        vec![WorkflowStep::new("s1", "a", "ok"), WorkflowStep::new("s2", "b", "ok")],
    )
    .await;

    let first = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    let second = engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);

    let history = engine.execution_history(&wf.id).await.unwrap();
    assert_eq!(step_ids(&history), vec!["s1", "s2", "s1", "s2"]);
    assert!(engine.execution_history("unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_definition_and_history() {
    let ok = MockTrigger::returning("ok", json!(1));
    let engine = engine_with(&[&ok]);
    let wf = create_chain(&engine, vec![WorkflowStep::new("s1", "a", "ok")]).await;
    engine.execute_workflow(&wf.id, Variables::new()).await.unwrap();

    assert!(engine.delete_workflow(&wf.id).await.unwrap());
    assert!(engine.get_workflow(&wf.id).await.unwrap().is_none());
    assert!(engine.execution_history(&wf.id).await.unwrap().is_empty());
    assert!(!engine.delete_workflow(&wf.id).await.unwrap());
}

#[tokio::test]
async fn create_stamps_id_status_and_timestamps() {
    let engine = engine_with(&[]);
    let created = engine
        .create_workflow(WorkflowDraft {
            name: "stamped".into(),
            status: Some(WorkflowStatus::Inactive),
            ..WorkflowDraft::default()
        })
        .await
        .unwrap();

    assert!(!created.id.is_empty());
    assert_eq!(created.status, WorkflowStatus::Active);
    assert_eq!(created.created_at, created.updated_at);

    let with_id = engine
        .create_workflow(WorkflowDraft {
            id: Some("chosen".into()),
            name: "named".into(),
            ..WorkflowDraft::default()
        })
        .await
        .unwrap();
    assert_eq!(with_id.id, "chosen");
    assert_eq!(engine.list_workflows().await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_rejects_an_id_that_is_taken() {
    let ok = MockTrigger::returning("ok", json!(1));
    let engine = engine_with(&[&ok]);
    let original = create_chain(&engine, vec![WorkflowStep::new("s1", "a", "ok")]).await;
    engine.execute_workflow(&original.id, Variables::new()).await.unwrap();

    let err = engine
        .create_workflow(WorkflowDraft {
            id: Some(original.id.clone()),
            name: "impostor".into(),
            ..WorkflowDraft::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(&err, EngineError::AlreadyExists(id) if *id == original.id));
    assert!(err.is_conflict());

    let stored = engine.get_workflow(&original.id).await.unwrap().unwrap();
    assert_eq!(stored, original);
    assert_eq!(engine.execution_history(&original.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_replaces_the_definition_and_keeps_identity() {
    let engine = engine_with(&[]);
    let created = create_chain(&engine, vec![WorkflowStep::new("s1", "a", "ok")]).await;

    let mut draft = WorkflowDraft::from(created.clone());
    draft.name = "renamed".into();
    draft.status = Some(WorkflowStatus::Inactive);
    let updated = engine
        .update_workflow(&created.id, draft.clone())
        .await
        .unwrap()
        .expect("workflow exists");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.status, WorkflowStatus::Inactive);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    assert!(engine.update_workflow("missing", draft).await.unwrap().is_none());
}

#[tokio::test]
async fn inline_definitions_run_without_touching_history() {
    let ok = MockTrigger::returning("ok", json!({ "inline": true }));
    let engine = engine_with(&[&ok]);
    let wf = Workflow::chain("adhoc", vec![WorkflowStep::new("s1", "a", "ok")]);

    let results = engine
        .execute_definition(&wf, Variables::new())
        .await
        .unwrap();
    assert_eq!(results[0].result, Some(json!({ "inline": true })));
    assert!(engine.execution_history(&wf.id).await.unwrap().is_empty());
    assert!(engine.get_workflow(&wf.id).await.unwrap().is_none());
}

#[test]
fn result_keys_follow_step_names() {
    let step = WorkflowStep::new("id-1", "fetch_products", "http_request");
    assert_eq!(step.result_key(), "fetch_products_result");
}
