//! The workflow execution engine (spec §4.4, §5).
//!
//! A run is driven by a fixed pool of workers pulling from a single
//! [`ReadyQueue`]. Each worker repeats: dequeue a node, check its gates,
//! assemble its input, execute it through the [`NodeRegistry`], record the
//! audit row, then route its result downstream. `Loop` nodes are the one
//! exception — a worker that dequeues one drives the whole per-item
//! sub-DAG itself rather than handing iterations back through the shared
//! queue, since feedback-edge aggregation needs to see every iteration of
//! a single loop run to completion before the loop can emit `"done"`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use dashmap::{DashMap, DashSet};
use db::DbPool;
use nodes::traits::{CredentialStore, ExecutionContext, NodeExecutionRequest, NotificationSink};
use nodes::{NodeError, NodeRegistry};

use crate::adapters::PersistentStateAdapter;
use crate::config::ExecutorConfig;
use crate::dag::{classify_edges, validate_dag, EdgeClassification};
use crate::edge_buffer::EdgeBuffers;
use crate::loops::{batches, build_loop_context, resolve_input_array};
use crate::models::{NodeDefinition, RunStatus, Workflow};
use crate::queue::ReadyQueue;
use crate::routing::{build_conditional_map, handle_key, ConditionalMap};
use crate::state::{PersistentState, StateLocks};
use crate::template::{resolve_value, ResolutionContext};
use crate::EngineError;

/// What a completed (or failed) run produced.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub result: HashMap<String, Value>,
    pub error_message: Option<String>,
}

/// Owns the node registry and per-run tunables; stateless between runs.
pub struct WorkflowExecutor {
    pool: DbPool,
    registry: Arc<NodeRegistry>,
    config: ExecutorConfig,
    state_locks: StateLocks,
}

impl WorkflowExecutor {
    #[must_use]
    pub fn new(pool: DbPool, registry: Arc<NodeRegistry>, config: ExecutorConfig) -> Self {
        Self {
            pool,
            registry,
            config,
            state_locks: StateLocks::new(),
        }
    }

    /// Run `workflow` to completion under `run_id`, which the caller
    /// (scheduler or API handler) has already inserted via
    /// `db::repository::executions::create_run`.
    #[instrument(skip(self, workflow, credentials, notifications), fields(workflow_id = %workflow.id, run_id = %run_id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        credentials: Arc<dyn CredentialStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<ExecutionResult, EngineError> {
        validate_dag(workflow)?;
        let classification = classify_edges(workflow);
        let conditional_map = build_conditional_map(workflow);

        let sources = workflow.source_nodes();
        if sources.is_empty() {
            return Err(EngineError::NoSources);
        }

        let persistent = Arc::new(PersistentState::load(
            workflow.id,
            workflow.persistent_state.clone(),
            self.pool.clone(),
            self.state_locks.clone(),
        ));

        let ctx = Arc::new(RunContext {
            workflow: workflow.clone(),
            classification,
            conditional_map,
            registry: self.registry.clone(),
            config: self.config.clone(),
            pool: self.pool.clone(),
            run_id,
            user_id: workflow.user_id,
            persistent,
            credentials,
            notifications,
            queue: ReadyQueue::new(),
            edge_buffers: EdgeBuffers::new(),
            executed: DashSet::new(),
            running: DashSet::new(),
            node_results: DashMap::new(),
            node_inputs: DashMap::new(),
            loop_trigger_override: DashMap::new(),
            node_attempts: DashMap::new(),
            dependency_retries: DashMap::new(),
            executed_count: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });

        for node in &sources {
            ctx.queue.enqueue(node.id.clone(), None).await;
        }

        let total_nodes = workflow.nodes.len();
        let worker_count = self.config.max_parallel.max(1);

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let worker_ctx = ctx.clone();
            workers.spawn(async move { worker_ctx.worker_loop(total_nodes).await });
        }

        let mut worker_error: Option<EngineError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    worker_error.get_or_insert(e);
                }
                Err(join_err) => {
                    worker_error.get_or_insert(EngineError::NodeFatal {
                        node_id: "<worker>".into(),
                        message: join_err.to_string(),
                    });
                }
            }
        }

        let (status, result_map, error_message) = if let Some(e) = worker_error {
            warn!(error = %e, "run failed");
            (RunStatus::Failed, HashMap::new(), Some(e.to_string()))
        } else {
            let mut result_map = HashMap::new();
            for entry in ctx.node_results.iter() {
                result_map.insert(entry.key().clone(), entry.value().clone());
            }
            info!("run completed");
            (RunStatus::Completed, result_map, None)
        };

        let result_value = serde_json::to_value(&result_map).unwrap_or(Value::Null);
        db::repository::executions::complete_run(
            &self.pool,
            run_id,
            &status.to_string(),
            Some(result_value),
            error_message.as_deref(),
        )
        .await?;

        let _ = ctx
            .notifications
            .notify("run", serde_json::json!({"run_id": run_id, "status": status.to_string()}))
            .await;

        Ok(ExecutionResult {
            run_id,
            status,
            result: result_map,
            error_message,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }
}

/// Shared state for one run, handed to every worker.
struct RunContext {
    workflow: Workflow,
    classification: EdgeClassification,
    conditional_map: ConditionalMap,
    registry: Arc<NodeRegistry>,
    config: ExecutorConfig,
    pool: DbPool,
    run_id: Uuid,
    user_id: Uuid,
    persistent: Arc<PersistentState>,
    credentials: Arc<dyn CredentialStore>,
    notifications: Arc<dyn NotificationSink>,
    queue: ReadyQueue,
    edge_buffers: EdgeBuffers,
    executed: DashSet<String>,
    running: DashSet<String>,
    node_results: DashMap<String, Value>,
    /// Last assembled input per node — needed when a branch routes into a
    /// `Loop`, which must see the branching node's original input rather
    /// than its boolean result (spec §4.4.3).
    node_inputs: DashMap<String, Value>,
    loop_trigger_override: DashMap<String, Value>,
    node_attempts: DashMap<String, u32>,
    dependency_retries: DashMap<String, u32>,
    executed_count: AtomicUsize,
    cancelled: AtomicBool,
}

impl RunContext {
    async fn worker_loop(self: Arc<Self>, total_nodes: usize) -> Result<(), EngineError> {
        loop {
            let node_id = self
                .queue
                .dequeue(
                    |id| self.executed.contains(id),
                    || {
                        self.cancelled.load(Ordering::SeqCst)
                            || self.executed_count.load(Ordering::SeqCst) >= total_nodes
                    },
                )
                .await;

            let Some(node_id) = node_id else {
                return Ok(());
            };
            if self.cancelled.load(Ordering::SeqCst) {
                return Ok(());
            }

            if let Err(e) = self.process_node(node_id).await {
                self.cancelled.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
    }

    async fn process_node(self: &Arc<Self>, node_id: String) -> Result<(), EngineError> {
        let Some(node) = self.workflow.node(&node_id).cloned() else {
            // Queued by a routing step but missing from the workflow —
            // shouldn't happen for a validated DAG, but skip rather than
            // poison the run.
            return Ok(());
        };

        if node.is_loop() {
            return self.execute_loop_node(&node).await;
        }

        if !dependency_ready(&self.workflow, &self.classification, &self.executed, &node_id)
            || !children_done_ready(&self.workflow, &node, &self.running)
        {
            let retries = bump_counter(&self.dependency_retries, &node_id);
            if retries > self.config.dependency_stall_limit {
                return Err(EngineError::DependencyStall { node_id, attempts: retries });
            }
            let delay = chrono::Duration::from_std(self.config.dependency_retry_delay).unwrap_or_default();
            self.queue.enqueue(node_id, Some(Utc::now() + delay)).await;
            return Ok(());
        }

        self.running.insert(node_id.clone());
        let input = assemble_input(&self.workflow, &self.node_results, &node, None);
        let input = apply_loop_trigger_override(&node, input, &self.loop_trigger_override);
        self.node_inputs.insert(node_id.clone(), input.clone());
        let node_outputs = node_outputs_snapshot(&self.workflow, &self.node_results);

        let outcome = self.execute_node_with_policy(&node_id, &node, input, &node_outputs).await;
        self.running.remove(&node_id);

        let value = outcome?;
        self.node_results.insert(node_id.clone(), value.clone());
        self.executed.insert(node_id.clone());
        self.executed_count.fetch_add(1, Ordering::SeqCst);
        self.route(&node, &value).await;
        Ok(())
    }

    /// Execute one node (normal or one loop-body iteration) with retry and
    /// continue-on-error policy (spec §4.4.2 step 6, §7), recording an
    /// audit row per attempt under `audit_key` — the plain node ID for a
    /// regular node, or `"{node_id}#{iteration}"` for a loop-body node, so
    /// concurrent iterations don't collide on the same `(run_id, node_id)`
    /// attempt sequence.
    async fn execute_node_with_policy(
        &self,
        audit_key: &str,
        node: &NodeDefinition,
        input: Value,
        node_outputs: &HashMap<String, Value>,
    ) -> Result<Value, EngineError> {
        let max_attempts = node
            .values
            .get("maxAttempts")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1) as u32;
        let continue_on_error = node
            .values
            .get("continueOnError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut last_error = String::new();
        let mut last_fatal = false;

        for attempt in 1..=max_attempts {
            self.node_attempts.insert(audit_key.to_string(), attempt);

            let audit = db::repository::executions::start_node_execution(
                &self.pool,
                self.run_id,
                audit_key,
                input.clone(),
                attempt as i32,
            )
            .await?;

            let resolved = resolve_value(&node.values, &ResolutionContext { json: &input, node_outputs });
            let request = NodeExecutionRequest {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                resolved_values: resolved,
                input: input.clone(),
            };
            let exec_ctx = ExecutionContext {
                user_id: self.user_id,
                workflow_id: self.workflow.id,
                run_id: self.run_id,
                state: Arc::new(PersistentStateAdapter(self.persistent.clone())),
                credentials: self.credentials.clone(),
                notifications: self.notifications.clone(),
            };

            match self.registry.dispatch(node.category(), &request, &exec_ctx).await {
                Ok(value) => {
                    db::repository::executions::finish_node_execution(
                        &self.pool,
                        audit.id,
                        "completed",
                        Some(value.clone()),
                        None,
                    )
                    .await?;
                    self.record_node_store(audit_key, "completed", Some(value.clone())).await;
                    return Ok(value);
                }
                Err(err) => {
                    let (msg, fatal) = match &err {
                        NodeError::Fatal(m) => (m.clone(), true),
                        NodeError::Retryable(m) => (m.clone(), false),
                    };
                    db::repository::executions::finish_node_execution(&self.pool, audit.id, "failed", None, Some(&msg))
                        .await?;
                    self.record_node_store(audit_key, "failed", None).await;
                    last_error = msg;
                    last_fatal = fatal;
                    if fatal {
                        break;
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.failure_retry_delay).await;
                    }
                }
            }
        }

        if continue_on_error {
            return Ok(serde_json::json!({"success": false, "error": last_error}));
        }

        Err(if last_fatal {
            EngineError::NodeFatal { node_id: node.id.clone(), message: last_error }
        } else {
            EngineError::NodeRetryExhausted { node_id: node.id.clone(), message: last_error }
        })
    }

    /// Mirrors a node's latest attempt into the node store sidecar (spec
    /// §4.6). Fire-and-forget from the worker's perspective — a write
    /// failure here is logged and never propagated, since the run's own
    /// terminal state already lives in the node-execution audit row.
    async fn record_node_store(&self, node_id: &str, state: &str, output: Option<Value>) {
        if let Err(e) = db::repository::node_store::set_node_state(&self.pool, self.run_id, node_id, state).await {
            warn!(node_id, error = %e, "failed to update node store state");
        }
        if let Some(output) = output {
            if let Err(e) = db::repository::node_store::set_node_output(&self.pool, self.run_id, node_id, output).await {
                warn!(node_id, error = %e, "failed to update node store output");
            }
        }
    }

    /// Route a non-loop node's result downstream (spec §4.4.3 / §4.4.2 step 5).
    async fn route(&self, node: &NodeDefinition, value: &Value) {
        if let Some(handles) = self.conditional_map.get(&node.id) {
            let key = handle_key(value);
            if let Some(targets) = handles.get(&key) {
                for target in targets {
                    if self.executed.contains(target) {
                        continue;
                    }
                    if self.workflow.node(target).is_some_and(NodeDefinition::is_loop) {
                        if let Some(original_input) = self.node_inputs.get(&node.id) {
                            self.loop_trigger_override.insert(target.clone(), original_input.value().clone());
                        }
                    }
                    self.queue.enqueue(target.clone(), None).await;
                }
            }
            return;
        }

        for edge in self.workflow.edges.iter().filter(|e| e.source == node.id) {
            if self.classification.is_feedback(&edge.id) {
                continue;
            }
            if self.executed.contains(&edge.target) {
                continue;
            }
            self.queue.enqueue(edge.target.clone(), None).await;
        }
    }

    /// Drive a `Loop` node's whole iteration (spec §4.4.4) to completion:
    /// resolve the item array, walk the "loop"-handle subgraph once per
    /// item (batched, optionally throttled), aggregate feedback edges, then
    /// emit the flattened result on the "done" handle.
    async fn execute_loop_node(self: &Arc<Self>, node: &NodeDefinition) -> Result<(), EngineError> {
        let merged_input = assemble_input(&self.workflow, &self.node_results, node, None);
        let merged_input = apply_loop_trigger_override(node, merged_input, &self.loop_trigger_override);
        self.node_inputs.insert(node.id.clone(), merged_input.clone());

        let items = resolve_input_array(node, &merged_input);
        let batch_size = node.values.get("batchSize").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;
        let throttle_ms = node.values.get("throttleMs").and_then(Value::as_u64).unwrap_or(0);

        let loop_targets: Vec<String> = self
            .workflow
            .edges
            .iter()
            .filter(|e| e.source == node.id && e.source_handle.as_deref() == Some("loop"))
            .map(|e| e.target.clone())
            .collect();

        let feedback_edge_order: Vec<String> = self
            .workflow
            .edges
            .iter()
            .filter(|e| e.target == node.id && self.classification.is_feedback(&e.id))
            .map(|e| e.id.clone())
            .collect();

        let body_order = loop_body_order(&self.workflow, &self.classification, &loop_targets);

        for batch in batches(&items, batch_size) {
            let mut iteration_set = JoinSet::new();
            for (index, item) in batch {
                let iter_ctx = self.clone();
                let targets = loop_targets.clone();
                let order = body_order.clone();
                let loop_ctx = build_loop_context(&item, index, &items);
                iteration_set.spawn(async move { iter_ctx.run_loop_iteration(&targets, &order, index, loop_ctx).await });
            }
            while let Some(joined) = iteration_set.join_next().await {
                joined.map_err(|e| EngineError::NodeFatal {
                    node_id: node.id.clone(),
                    message: e.to_string(),
                })??;
            }
            if throttle_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(throttle_ms)).await;
            }
        }

        let flattened = self.edge_buffers.drain_flattened(&node.id, &feedback_edge_order).await;
        self.node_results.insert(node.id.clone(), Value::Array(flattened));
        self.executed.insert(node.id.clone());
        self.executed_count.fetch_add(1, Ordering::SeqCst);

        for edge in self
            .workflow
            .edges
            .iter()
            .filter(|e| e.source == node.id && e.source_handle.as_deref() == Some("done"))
        {
            if !self.executed.contains(&edge.target) {
                self.queue.enqueue(edge.target.clone(), None).await;
            }
        }
        Ok(())
    }

    /// Execute the "loop"-handle subgraph once, for a single item. Results
    /// are kept in a map local to this iteration — never written to the
    /// run's global `node_results` — since the loop body's per-item view
    /// must not leak into sibling iterations or downstream-of-loop nodes.
    async fn run_loop_iteration(
        self: Arc<Self>,
        targets: &[String],
        body_order: &[String],
        index: usize,
        loop_ctx: Value,
    ) -> Result<(), EngineError> {
        let mut local_results: HashMap<String, Value> = HashMap::new();

        for node_id in body_order {
            let Some(node) = self.workflow.node(node_id).cloned() else { continue };

            let input = if targets.contains(node_id) {
                merge_objects(&node.data, &loop_ctx)
            } else {
                let mut merged = node.data.as_object().cloned().unwrap_or_default();
                for edge in self
                    .workflow
                    .edges
                    .iter()
                    .filter(|e| e.target == *node_id && !self.classification.is_feedback(&e.id))
                {
                    if let Some(Value::Object(obj)) = local_results.get(&edge.source) {
                        for (k, v) in obj {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                }
                Value::Object(merged)
            };

            let node_outputs = local_results.clone();
            let audit_key = format!("{node_id}#{index}");
            let value = self.execute_node_with_policy(&audit_key, &node, input, &node_outputs).await?;

            for edge in self.workflow.edges.iter().filter(|e| e.source == *node_id) {
                if self.classification.is_feedback(&edge.id) {
                    self.edge_buffers.push(&edge.target, &edge.id, index, value.clone()).await;
                }
            }
            local_results.insert(node_id.clone(), value);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure helpers — free functions so they're testable without a `DbPool`.
// ---------------------------------------------------------------------------

/// Dependency gate (spec §4.4.2 step 1): every non-feedback incoming edge's
/// source must already be executed.
#[must_use]
fn dependency_ready(
    workflow: &Workflow,
    classification: &EdgeClassification,
    executed: &DashSet<String>,
    node_id: &str,
) -> bool {
    workflow
        .edges
        .iter()
        .filter(|e| e.target == node_id && !classification.is_feedback(&e.id))
        .all(|e| executed.contains(&e.source))
}

/// Children-done gate (spec §4.4.2 step 2): direct successors must not be
/// mid-execution, exempt for `Loop` nodes (which must be free to re-enter
/// their own downstream-of-loop subtree while it's still draining).
#[must_use]
fn children_done_ready(workflow: &Workflow, node: &NodeDefinition, running: &DashSet<String>) -> bool {
    if node.is_loop() {
        return true;
    }
    workflow.edges.iter().filter(|e| e.source == node.id).all(|e| !running.contains(&e.target))
}

fn bump_counter(map: &DashMap<String, u32>, key: &str) -> u32 {
    let mut entry = map.entry(key.to_string()).or_insert(0);
    *entry += 1;
    *entry
}

fn merge_objects(base: &Value, overlay: &Value) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    if let Some(obj) = overlay.as_object() {
        for (k, v) in obj {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// Input assembly (spec §4.4.2 step 3): `node.data` as defaults, merged
/// with upstream non-feedback results in edge order (later overrides
/// earlier). `loop_ctx`, when given, replaces the upstream merge entirely
/// — the loop body sees only `{...node.data, ...loopContext}`.
fn assemble_input(
    workflow: &Workflow,
    node_results: &DashMap<String, Value>,
    node: &NodeDefinition,
    loop_ctx: Option<&Value>,
) -> Value {
    if let Some(loop_ctx) = loop_ctx {
        return merge_objects(&node.data, loop_ctx);
    }
    let mut merged = node.data.as_object().cloned().unwrap_or_default();
    for edge in workflow.edges.iter().filter(|e| e.target == node.id) {
        if let Some(result) = node_results.get(&edge.source) {
            if let Value::Object(obj) = result.value() {
                for (k, v) in obj {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
    }
    Value::Object(merged)
}

/// A branch routed into a `Loop` must feed it the branching node's original
/// input rather than its boolean result (spec §4.4.3).
fn apply_loop_trigger_override(node: &NodeDefinition, input: Value, overrides: &DashMap<String, Value>) -> Value {
    if !node.is_loop() {
        return input;
    }
    let Some(over) = overrides.get(&node.id) else {
        return input;
    };
    merge_objects(&input, over.value())
}

fn node_outputs_snapshot(workflow: &Workflow, node_results: &DashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for entry in node_results.iter() {
        let id = entry.key().clone();
        let value = entry.value().clone();
        if let Some(node) = workflow.node(&id) {
            out.insert(node.display_name(), value.clone());
        }
        out.insert(id, value);
    }
    out
}

/// Topological order of the subgraph reachable from `targets` via
/// non-feedback edges — the fixed per-iteration execution order for a
/// loop's body.
fn loop_body_order(workflow: &Workflow, classification: &EdgeClassification, targets: &[String]) -> Vec<String> {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = targets.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        for edge in workflow.edges.iter().filter(|e| e.source == id && !classification.is_feedback(&e.id)) {
            if !reachable.contains(&edge.target) {
                queue.push_back(edge.target.clone());
            }
        }
    }

    let mut in_degree: HashMap<String, usize> = reachable.iter().cloned().map(|id| (id, 0)).collect();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for edge in &workflow.edges {
        if classification.is_feedback(&edge.id) {
            continue;
        }
        if reachable.contains(&edge.source) && reachable.contains(&edge.target) {
            adjacency.entry(edge.source.clone()).or_default().push(edge.target.clone());
            *in_degree.entry(edge.target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: VecDeque<String> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(k, _)| k.clone()).collect();
    let mut order = Vec::new();
    while let Some(id) = ready.pop_front() {
        order.push(id.clone());
        if let Some(children) = adjacency.get(&id) {
            for child in children {
                let degree = in_degree.get_mut(child).expect("child counted in in_degree");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(child.clone());
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod pure_logic_tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, node_type: &str, values: Value, data: Value) -> NodeDefinition {
        NodeDefinition { id: id.into(), node_type: node_type.into(), category: None, position: None, values, data }
    }

    fn edge(id: &str, source: &str, target: &str, handle: Option<&str>) -> crate::models::Edge {
        crate::models::Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: handle.map(str::to_owned),
            target_handle: None,
        }
    }

    fn workflow(nodes: Vec<NodeDefinition>, edges: Vec<crate::models::Edge>) -> Workflow {
        Workflow::new(Uuid::new_v4(), "wf", nodes, edges)
    }

    #[test]
    fn dependency_gate_waits_for_all_non_feedback_sources() {
        let wf = workflow(
            vec![
                node("a", "Transform", Value::Null, Value::Null),
                node("b", "Transform", Value::Null, Value::Null),
                node("c", "Transform", Value::Null, Value::Null),
            ],
            vec![edge("e1", "a", "c", None), edge("e2", "b", "c", None)],
        );
        let classification = classify_edges(&wf);
        let executed = DashSet::new();
        assert!(!dependency_ready(&wf, &classification, &executed, "c"));
        executed.insert("a".to_string());
        assert!(!dependency_ready(&wf, &classification, &executed, "c"));
        executed.insert("b".to_string());
        assert!(dependency_ready(&wf, &classification, &executed, "c"));
    }

    #[test]
    fn feedback_edges_are_excluded_from_the_dependency_gate() {
        let wf = workflow(
            vec![node("loop", "Loop", Value::Null, Value::Null), node("body", "Transform", Value::Null, Value::Null)],
            vec![
                edge("e1", "loop", "body", Some("loop")),
                edge("e2", "body", "loop", None), // feedback: body is downstream of loop
            ],
        );
        let classification = classify_edges(&wf);
        assert!(classification.is_feedback("e2"));
        let executed = DashSet::new();
        // loop has no non-feedback incoming edges, so it's ready immediately
        assert!(dependency_ready(&wf, &classification, &executed, "loop"));
    }

    #[test]
    fn children_done_gate_exempts_loop_nodes() {
        let wf = workflow(
            vec![node("loop", "Loop", Value::Null, Value::Null), node("body", "Transform", Value::Null, Value::Null)],
            vec![edge("e1", "loop", "body", Some("loop"))],
        );
        let loop_node = wf.node("loop").unwrap();
        let running = DashSet::new();
        running.insert("body".to_string());
        assert!(children_done_ready(&wf, loop_node, &running));
    }

    #[test]
    fn children_done_gate_blocks_while_a_direct_child_is_running() {
        let wf = workflow(
            vec![node("a", "Transform", Value::Null, Value::Null), node("b", "Transform", Value::Null, Value::Null)],
            vec![edge("e1", "a", "b", None)],
        );
        let a = wf.node("a").unwrap();
        let running = DashSet::new();
        assert!(children_done_ready(&wf, a, &running));
        running.insert("b".to_string());
        assert!(!children_done_ready(&wf, a, &running));
    }

    #[test]
    fn assemble_input_merges_upstream_in_edge_order() {
        let wf = workflow(
            vec![
                node("a", "Transform", Value::Null, Value::Null),
                node("b", "Transform", Value::Null, Value::Null),
                node("c", "Transform", Value::Null, json!({"default": true})),
            ],
            vec![edge("e1", "a", "c", None), edge("e2", "b", "c", None)],
        );
        let node_results = DashMap::new();
        node_results.insert("a".to_string(), json!({"x": 1, "shared": "a"}));
        node_results.insert("b".to_string(), json!({"y": 2, "shared": "b"}));
        let input = assemble_input(&wf, &node_results, wf.node("c").unwrap(), None);
        assert_eq!(input["default"], json!(true));
        assert_eq!(input["x"], json!(1));
        assert_eq!(input["y"], json!(2));
        assert_eq!(input["shared"], json!("b")); // b comes after a in edge order
    }

    #[test]
    fn assemble_input_with_loop_context_ignores_upstream() {
        let wf = workflow(vec![node("body", "Transform", Value::Null, json!({"default": 1}))], vec![]);
        let node_results = DashMap::new();
        node_results.insert("upstream".to_string(), json!({"ignored": true}));
        let loop_ctx = json!({"loopItem": "x", "loopIndex": 0});
        let input = assemble_input(&wf, &node_results, wf.node("body").unwrap(), Some(&loop_ctx));
        assert_eq!(input["default"], json!(1));
        assert_eq!(input["loopItem"], json!("x"));
        assert!(input.get("ignored").is_none());
    }

    #[test]
    fn loop_body_order_is_topologically_sorted() {
        let wf = workflow(
            vec![
                node("loop", "Loop", Value::Null, Value::Null),
                node("x", "Transform", Value::Null, Value::Null),
                node("y", "Transform", Value::Null, Value::Null),
            ],
            vec![
                edge("e1", "loop", "x", Some("loop")),
                edge("e2", "x", "y", None),
                edge("e3", "y", "loop", None), // feedback
            ],
        );
        let classification = classify_edges(&wf);
        let order = loop_body_order(&wf, &classification, &["x".to_string()]);
        assert_eq!(order, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn node_outputs_snapshot_keys_by_both_id_and_display_name() {
        let wf = workflow(vec![node("n1", "Transform", json!({"label": "Named Node"}), Value::Null)], vec![]);
        let node_results = DashMap::new();
        node_results.insert("n1".to_string(), json!({"v": 1}));
        let snapshot = node_outputs_snapshot(&wf, &node_results);
        assert_eq!(snapshot["n1"], json!({"v": 1}));
        assert_eq!(snapshot["Named Node"], json!({"v": 1}));
    }
}
