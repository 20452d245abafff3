//! DAG validation and feedback-edge classification — run before persisting
//! or executing a workflow.
//!
//! Rules enforced by [`validate_dag`]:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `source` and `target`).
//! 3. The graph, once feedback edges into `Loop` nodes are set aside, must be
//!    acyclic (spec §4.4.5 / §9 — a `Loop` is a designed cycle, not a bug;
//!    cycle detection is a pre-flight diagnostic over everything *except*
//!    those edges).
//!
//! Returns a topologically-sorted list of node IDs on success, which the
//! executor uses only to seed its initial readiness state — actual
//! scheduling is driven by the dependency gate in `executor`, not by this
//! static order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{models::Workflow, EngineError};

/// Which edges into `Loop` nodes are feedback (aggregated into the edge
/// buffer) versus trigger (merged into the loop's initial input), keyed by
/// edge ID.
#[derive(Debug, Default)]
pub struct EdgeClassification {
    pub feedback: HashSet<String>,
    pub trigger_into_loop: HashSet<String>,
}

impl EdgeClassification {
    #[must_use]
    pub fn is_feedback(&self, edge_id: &str) -> bool {
        self.feedback.contains(edge_id)
    }
}

/// Classify every edge whose target is a `Loop` node as feedback or trigger.
///
/// An edge `(s, loop)` is feedback iff `s` is reachable from `loop` by
/// following edges forward (excluding the edge itself) — i.e. `s` lies
/// downstream of the loop already. Otherwise it's a trigger edge feeding the
/// loop's initial input.
#[must_use]
pub fn classify_edges(workflow: &Workflow) -> EdgeClassification {
    let mut out = EdgeClassification::default();

    let loop_ids: HashSet<&str> = workflow
        .nodes
        .iter()
        .filter(|n| n.is_loop())
        .map(|n| n.id.as_str())
        .collect();

    if loop_ids.is_empty() {
        return out;
    }

    for edge in &workflow.edges {
        if !loop_ids.contains(edge.target.as_str()) {
            continue;
        }

        let downstream = downstream_reachable(workflow, &edge.target, Some(&edge.id));
        if downstream.contains(edge.source.as_str()) {
            out.feedback.insert(edge.id.clone());
        } else {
            out.trigger_into_loop.insert(edge.id.clone());
        }
    }

    out
}

/// Nodes reachable from `start` by following edges forward, optionally
/// ignoring one edge (by ID) to avoid the trivial self-reachability of the
/// edge under test.
fn downstream_reachable<'a>(
    workflow: &'a Workflow,
    start: &str,
    ignore_edge: Option<&str>,
) -> HashSet<&'a str> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &workflow.edges {
        if Some(edge.id.as_str()) == ignore_edge {
            continue;
        }
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    if let Some(neighbours) = adjacency.get(start) {
        for &n in neighbours {
            queue.push_back(n);
        }
    }

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        if let Some(neighbours) = adjacency.get(node) {
            for &n in neighbours {
                queue.push_back(n);
            }
        }
    }

    visited
}

/// Validate the workflow's DAG and return nodes in topological execution
/// order, computed over the graph with Loop feedback edges removed.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::CycleDetected`] if a non-Loop cycle remains.
pub fn validate_dag(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    let node_set: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        if !node_set.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !node_set.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm), excluding Loop feedback edges
    // -----------------------------------------------------------------------
    let classification = classify_edges(workflow);

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &workflow.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &workflow.edges {
        if classification.is_feedback(&edge.id) {
            continue;
        }
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(workflow.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a non-loop cycle.
    if sorted.len() != workflow.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, NodeDefinition};
    use uuid::Uuid;

    fn make_node(id: &str) -> NodeDefinition {
        make_node_typed(id, "mock")
    }

    fn make_node_typed(id: &str, node_type: &str) -> NodeDefinition {
        NodeDefinition {
            id: id.to_string(),
            node_type: node_type.to_string(),
            category: None,
            position: None,
            values: serde_json::Value::Null,
            data: serde_json::Value::Null,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    fn make_workflow(nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Workflow {
        Workflow::new(Uuid::new_v4(), "test", nodes, edges)
    }

    #[test]
    fn valid_linear_dag_returns_sorted_order() {
        // A → B → C
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c")],
            vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
        );

        let sorted = validate_dag(&workflow).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn valid_diamond_dag() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c"), make_node("d")],
            vec![
                edge("e1", "a", "b"),
                edge("e2", "a", "c"),
                edge("e3", "b", "d"),
                edge("e4", "c", "d"),
            ],
        );

        let sorted = validate_dag(&workflow).expect("should be valid");
        assert_eq!(sorted.first().unwrap(), "a");
        assert_eq!(sorted.last().unwrap(), "d");
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let workflow = make_workflow(vec![make_node("a"), make_node("a")], vec![]);
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let workflow = make_workflow(vec![make_node("a")], vec![edge("e1", "a", "ghost")]);
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::UnknownNodeReference { node_id, .. }) if node_id == "ghost"
        ));
    }

    #[test]
    fn non_loop_cycle_is_detected() {
        // A → B → C → A  (back-edge, not through a Loop node)
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c")],
            vec![edge("e1", "a", "b"), edge("e2", "b", "c"), edge("e3", "c", "a")],
        );
        assert!(matches!(validate_dag(&workflow), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let workflow = make_workflow(vec![make_node("solo")], vec![]);
        let sorted = validate_dag(&workflow).expect("single node should be valid");
        assert_eq!(sorted, vec!["solo"]);
    }

    #[test]
    fn loop_feedback_edge_is_not_a_cycle() {
        // trigger -> loop -> body -> (feedback) -> loop
        let workflow = make_workflow(
            vec![
                make_node_typed("trigger", "trigger"),
                make_node_typed("loop", "Loop"),
                make_node_typed("body", "Transform"),
            ],
            vec![
                edge("e1", "trigger", "loop"),
                edge("e2", "loop", "body"),
                edge("e3", "body", "loop"),
            ],
        );

        let classification = classify_edges(&workflow);
        assert!(classification.is_feedback("e3"));
        assert!(!classification.is_feedback("e1"));

        let sorted = validate_dag(&workflow).expect("loop cycles should validate");
        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[0], "trigger");
    }
}
