//! Branch routing (spec §4.4.3) and the `conditionalMap` precomputed at
//! startup (spec §4.4.1) from edges whose source is a branching node.

use std::collections::HashMap;

use serde_json::Value;

use crate::models::Workflow;

/// `node_id -> handle -> target node IDs`, built once per run from edges
/// whose source is a recognised branching type (`If`, `Switch`).
pub type ConditionalMap = HashMap<String, HashMap<String, Vec<String>>>;

#[must_use]
pub fn build_conditional_map(workflow: &Workflow) -> ConditionalMap {
    let mut map: ConditionalMap = HashMap::new();
    for edge in &workflow.edges {
        let Some(source_node) = workflow.node(&edge.source) else {
            continue;
        };
        if !source_node.is_branching() {
            continue;
        }
        let handle = edge.source_handle.clone().unwrap_or_default();
        map.entry(edge.source.clone())
            .or_default()
            .entry(handle)
            .or_default()
            .push(edge.target.clone());
    }
    map
}

/// Normalise a node's result into the handle key used to look up
/// `conditionalMap[node_id]` (spec §4.4.3).
#[must_use]
pub fn handle_key(result: &Value) -> String {
    match result {
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => {
            if map.get("true").is_some_and(truthy) {
                return "true".to_string();
            }
            if map.get("false").is_some_and(truthy) {
                return "false".to_string();
            }
            if let Some(result_field) = map.get("result") {
                return stringify(result_field);
            }
            if let Some(output_field) = map.get("output") {
                return stringify(output_field);
            }
            stringify(result)
        }
        other => stringify(other),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, NodeDefinition};
    use serde_json::json;
    use uuid::Uuid;

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

    #[test]
    fn handle_key_normalises_booleans() {
        assert_eq!(handle_key(&json!(true)), "true");
        assert_eq!(handle_key(&json!(false)), "false");
    }

    #[test]
    fn handle_key_prefers_true_false_fields() {
        assert_eq!(handle_key(&json!({"true": 1})), "true");
        assert_eq!(handle_key(&json!({"false": 1})), "false");
    }

    #[test]
    fn handle_key_falls_back_to_result_then_output_then_string() {
        assert_eq!(handle_key(&json!({"result": "case1"})), "case1");
        assert_eq!(handle_key(&json!({"output": "case2"})), "case2");
        assert_eq!(handle_key(&json!({"other": 1})), json!({"other": 1}).to_string());
    }

    #[test]
    fn conditional_map_only_includes_branching_sources() {
        let workflow = Workflow::new(
            Uuid::new_v4(),
            "t",
            vec![node("branch", "If"), node("plain", "Transform"), node("tgt", "Transform")],
            vec![
                Edge {
                    id: "e1".into(),
                    source: "branch".into(),
                    target: "tgt".into(),
                    source_handle: Some("true".into()),
                    target_handle: None,
                },
                Edge {
                    id: "e2".into(),
                    source: "plain".into(),
                    target: "tgt".into(),
                    source_handle: None,
                    target_handle: None,
                },
            ],
        );

        let map = build_conditional_map(&workflow);
        assert!(map.contains_key("branch"));
        assert!(!map.contains_key("plain"));
        assert_eq!(map["branch"]["true"], vec!["tgt".to_string()]);
    }
}
