//! Engine-level tests that don't require a live Postgres connection.
//!
//! `WorkflowExecutor::run` writes an audit row per node attempt through
//! `db::repository::executions`, so exercising it end-to-end needs a real
//! `DbPool` — that's left to a Postgres-backed integration suite this repo
//! doesn't carry. These tests instead cover the DB-free layers: DAG
//! validation/classification, and node dispatch through `MockNode`/
//! `NodeRegistry` driven by hand, the way the engine's worker loop would.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use engine::dag::{classify_edges, validate_dag};
use engine::models::{Edge, NodeDefinition, Workflow};
use nodes::mock::MockNode;
use nodes::traits::{ExecutionContext, NodeExecutionRequest};
use nodes::defaults::{NoopCredentialStore, NoopNotificationSink};
use nodes::{CategoryExecutor, NodeCategory};

fn node(id: &str, node_type: &str) -> NodeDefinition {
    NodeDefinition {
        id: id.into(),
        node_type: node_type.into(),
        category: None,
        position: None,
        values: Value::Null,
        data: Value::Null,
    }
}

fn edge(id: &str, source: &str, target: &str) -> Edge {
    Edge { id: id.into(), source: source.into(), target: target.into(), source_handle: None, target_handle: None }
}

fn linear_workflow(ids: &[&str]) -> Workflow {
    let nodes = ids.iter().map(|id| node(id, "Transform")).collect();
    let edges = ids
        .windows(2)
        .enumerate()
        .map(|(i, w)| edge(&format!("e{i}"), w[0], w[1]))
        .collect();
    Workflow::new(Uuid::new_v4(), "test-linear", nodes, edges)
}

fn ctx() -> ExecutionContext {
    ExecutionContext {
        user_id: Uuid::new_v4(),
        workflow_id: Uuid::new_v4(),
        run_id: Uuid::new_v4(),
        state: Arc::new(nodes::defaults::NoopPersistentState),
        credentials: Arc::new(NoopCredentialStore),
        notifications: Arc::new(NoopNotificationSink),
    }
}

// ============================================================
// DAG validation / classification
// ============================================================

#[test]
fn linear_workflow_validates_and_sorts_correctly() {
    let wf = linear_workflow(&["step_a", "step_b", "step_c"]);
    let sorted = validate_dag(&wf).expect("should be a valid DAG");
    assert_eq!(sorted, vec!["step_a", "step_b", "step_c"]);
}

#[test]
fn cycle_in_linear_workflow_is_detected() {
    let mut wf = linear_workflow(&["x", "y", "z"]);
    wf.edges.push(edge("back", "z", "x"));
    assert!(validate_dag(&wf).is_err());
}

#[test]
fn missing_node_reference_is_rejected() {
    let wf = Workflow::new(Uuid::new_v4(), "bad", vec![node("a", "Transform")], vec![edge("e1", "a", "b")]);
    assert!(validate_dag(&wf).is_err());
}

#[test]
fn loop_feedback_cycle_is_not_a_validation_error() {
    let wf = Workflow::new(
        Uuid::new_v4(),
        "loopy",
        vec![node("loop", "Loop"), node("body", "Transform")],
        vec![
            Edge {
                id: "e1".into(),
                source: "loop".into(),
                target: "body".into(),
                source_handle: Some("loop".into()),
                target_handle: None,
            },
            edge("e2", "body", "loop"),
        ],
    );
    assert!(validate_dag(&wf).is_ok());
    let classification = classify_edges(&wf);
    assert!(classification.is_feedback("e2"));
}

// ============================================================
// MockNode execution — mirrors what the worker loop does per node, without
// the DB-backed audit trail.
// ============================================================

#[tokio::test]
async fn three_node_pipeline_output_propagation() {
    let wf = linear_workflow(&["node_a", "node_b", "node_c"]);
    let sorted = validate_dag(&wf).expect("valid dag");
    let exec_ctx = ctx();

    let mocks: HashMap<&str, MockNode> = [
        ("node_a", MockNode::returning("node_a", json!({ "step": 1 }))),
        ("node_b", MockNode::returning("node_b", json!({ "step": 2 }))),
        ("node_c", MockNode::returning("node_c", json!({ "step": 3 }))),
    ]
    .into_iter()
    .collect();

    let mut current_input = json!({ "origin": "trigger" });
    let mut execution_order = Vec::new();

    for node_id in &sorted {
        let request = NodeExecutionRequest {
            node_id: node_id.clone(),
            node_type: "mock".into(),
            resolved_values: Value::Null,
            input: current_input.clone(),
        };
        let output = mocks[node_id.as_str()].execute(&request, &exec_ctx).await.expect("node should succeed");
        execution_order.push(node_id.clone());
        current_input = output;
    }

    assert_eq!(execution_order, vec!["node_a", "node_b", "node_c"]);
    assert_eq!(mocks["node_a"].call_count(), 1);
    assert_eq!(mocks["node_b"].call_count(), 1);
    assert_eq!(mocks["node_c"].call_count(), 1);
    assert_eq!(current_input["node"], "node_c");
    assert_eq!(current_input["step"], 3);
}

#[tokio::test]
async fn fatal_node_error_stops_pipeline() {
    let wf = linear_workflow(&["ok", "boom", "never"]);
    let sorted = validate_dag(&wf).expect("valid dag");
    let exec_ctx = ctx();

    let mocks: HashMap<&str, MockNode> = [
        ("ok", MockNode::returning("ok", json!({ "ok": true }))),
        ("boom", MockNode::failing_fatal("boom", "something broke irreparably")),
        ("never", MockNode::returning("never", json!({ "should": "not run" }))),
    ]
    .into_iter()
    .collect();

    let mut current_input = json!({});
    let mut hit_fatal = false;

    for node_id in &sorted {
        let request = NodeExecutionRequest {
            node_id: node_id.clone(),
            node_type: "mock".into(),
            resolved_values: Value::Null,
            input: current_input.clone(),
        };
        match mocks[node_id.as_str()].execute(&request, &exec_ctx).await {
            Ok(out) => current_input = out,
            Err(e) => {
                assert_eq!(node_id, "boom");
                assert!(matches!(e, nodes::NodeError::Fatal(_)));
                hit_fatal = true;
                break;
            }
        }
    }

    assert!(hit_fatal, "expected a fatal error");
    assert_eq!(mocks["never"].call_count(), 0);
}

#[tokio::test]
async fn retryable_node_error_is_returned_correctly() {
    let mock = MockNode::failing_retryable("flaky", "transient failure");
    let request = NodeExecutionRequest {
        node_id: "flaky".into(),
        node_type: "mock".into(),
        resolved_values: Value::Null,
        input: json!({}),
    };
    let result = mock.execute(&request, &ctx()).await;
    assert!(matches!(result, Err(nodes::NodeError::Retryable(_))));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn dispatch_through_registry_uses_derived_category() {
    let mut registry = nodes::NodeRegistry::with_builtins();
    registry.register(NodeCategory::Utility, Arc::new(MockNode::returning("replaced", json!({"v": 42}))));

    let request = NodeExecutionRequest {
        node_id: "n1".into(),
        node_type: "Scheduler".into(),
        resolved_values: Value::Null,
        input: json!({}),
    };
    let result = registry.dispatch(NodeCategory::Utility, &request, &ctx()).await.unwrap();
    assert_eq!(result["v"], json!(42));
}
