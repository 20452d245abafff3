//! Pure helpers for `Loop` node iteration (spec §4.4.4). The executor drives
//! the actual per-iteration subgraph walk using the dependency gate and
//! edge buffer; this module only computes the item array, the
//! per-iteration context payload, and batch grouping.

use serde_json::{json, Value};

use crate::models::NodeDefinition;

/// The `loopContext` merged into every downstream node visited during one
/// iteration, per spec §4.4.2 input assembly (`{…node.data, …loopContext}`,
/// never merged with upstream — the loop body sees the per-item view).
#[must_use]
pub fn build_loop_context(item: &Value, index: usize, items: &[Value]) -> Value {
    json!({
        "loopItem": item,
        "loopIndex": index,
        "loopItems": items,
    })
}

/// Resolve the array a `Loop` node iterates over. Tries, in order:
/// 1. `values.inputArray`, already resolved to an array by the reference
///    resolver.
/// 2. The merged upstream input, if it is itself an array.
/// 3. An `items` field on the merged upstream input.
/// 4. An empty array — the loop still emits `"done": []`.
#[must_use]
pub fn resolve_input_array(node: &NodeDefinition, merged_input: &Value) -> Vec<Value> {
    if let Some(Value::Array(items)) = node.values.get("inputArray") {
        return items.clone();
    }
    if let Value::Array(items) = merged_input {
        return items.clone();
    }
    if let Some(Value::Array(items)) = merged_input.get("items") {
        return items.clone();
    }
    Vec::new()
}

/// Group `(index, item)` pairs into batches of at most `batch_size` (spec
/// `values.batchSize`, default 1 — fully sequential iteration).
#[must_use]
pub fn batches(items: &[Value], batch_size: usize) -> Vec<Vec<(usize, Value)>> {
    let batch_size = batch_size.max(1);
    items
        .iter()
        .cloned()
        .enumerate()
        .collect::<Vec<_>>()
        .chunks(batch_size)
        .map(<[_]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_input_array(items: Vec<Value>) -> NodeDefinition {
        NodeDefinition {
            id: "loop".into(),
            node_type: "Loop".into(),
            category: None,
            position: None,
            values: json!({"inputArray": items}),
            data: Value::Null,
        }
    }

    #[test]
    fn batches_respects_size_and_preserves_order() {
        let items = vec![json!(0), json!(1), json!(2), json!(3), json!(4)];
        let grouped = batches(&items, 2);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0], vec![(0, json!(0)), (1, json!(1))]);
        assert_eq!(grouped[2], vec![(4, json!(4))]);
    }

    #[test]
    fn batch_size_zero_is_treated_as_one() {
        let items = vec![json!("a"), json!("b")];
        let grouped = batches(&items, 0);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn resolve_input_array_prefers_explicit_input_array() {
        let node = node_with_input_array(vec![json!(1), json!(2)]);
        let resolved = resolve_input_array(&node, &json!({"ignored": true}));
        assert_eq!(resolved, vec![json!(1), json!(2)]);
    }

    #[test]
    fn resolve_input_array_falls_back_to_merged_array_input() {
        let node = NodeDefinition {
            id: "loop".into(),
            node_type: "Loop".into(),
            category: None,
            position: None,
            values: Value::Null,
            data: Value::Null,
        };
        let resolved = resolve_input_array(&node, &json!([1, 2, 3]));
        assert_eq!(resolved, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn resolve_input_array_defaults_to_empty() {
        let node = NodeDefinition {
            id: "loop".into(),
            node_type: "Loop".into(),
            category: None,
            position: None,
            values: Value::Null,
            data: Value::Null,
        };
        let resolved = resolve_input_array(&node, &json!({"nothing": "useful"}));
        assert!(resolved.is_empty());
    }
}
