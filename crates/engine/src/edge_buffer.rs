//! Per-loop edge buffers — collect feedback-edge payloads emitted during
//! each iteration of a `Loop` node so it can flatten them into its
//! `"done"` emission once iteration completes (spec §4.4.4).

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

/// One loop node's accumulated feedback, keyed by edge ID then loop
/// iteration index — keeping iterations indexed, rather than append-order,
/// is what lets the final flatten preserve input-array order regardless of
/// which iteration's feedback lands first.
#[derive(Default)]
struct LoopBuffer {
    by_edge: HashMap<String, HashMap<usize, Value>>,
}

/// Process-wide table of loop node → buffer. A run owns one instance.
#[derive(Default)]
pub struct EdgeBuffers {
    buffers: DashMap<String, Mutex<LoopBuffer>>,
}

impl EdgeBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a feedback payload for `loop_node`'s `edge_id`, produced
    /// during iteration `loop_index`.
    pub async fn push(&self, loop_node: &str, edge_id: &str, loop_index: usize, payload: Value) {
        let entry = self
            .buffers
            .entry(loop_node.to_string())
            .or_insert_with(|| Mutex::new(LoopBuffer::default()));
        let mut buf = entry.lock().await;
        buf.by_edge.entry(edge_id.to_string()).or_default().insert(loop_index, payload);
    }

    /// Flatten and drain the buffer for `loop_node` into a JSON array
    /// ordered by iteration index. Entries landing at the same index across
    /// multiple feedback edges are object-merged in `edge_order`.
    pub async fn drain_flattened(&self, loop_node: &str, edge_order: &[String]) -> Vec<Value> {
        let Some(entry) = self.buffers.get(loop_node) else {
            return Vec::new();
        };
        let taken = {
            let mut buf = entry.value().lock().await;
            std::mem::take(&mut buf.by_edge)
        };

        let max_index = taken
            .values()
            .filter_map(|per_edge| per_edge.keys().max())
            .max()
            .copied();

        let Some(max_index) = max_index else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for idx in 0..=max_index {
            let contributions: Vec<(&String, &Value)> = edge_order
                .iter()
                .filter_map(|edge_id| taken.get(edge_id).and_then(|per_edge| per_edge.get(&idx)).map(|v| (edge_id, v)))
                .collect();

            match contributions.as_slice() {
                [] => continue,
                // A single contributing edge passes its payload through
                // untouched — a scalar (e.g. a bare number from a Math
                // node) must not be wrapped in a synthetic object keyed by
                // the internal edge ID (spec §4.4.4 invariant 3: flat
                // concatenation of feedback payloads).
                [(_, value)] => out.push((*value).clone()),
                _ => {
                    let mut merged = serde_json::Map::new();
                    for (edge_id, value) in contributions {
                        match value {
                            Value::Object(map) => merged.extend(map.clone()),
                            other => {
                                merged.insert(edge_id.clone(), other.clone());
                            }
                        }
                    }
                    out.push(Value::Object(merged));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn flattens_in_iteration_index_order_regardless_of_arrival_order() {
        let buffers = EdgeBuffers::new();
        buffers.push("loop1", "e1", 1, json!({"result": "second"})).await;
        buffers.push("loop1", "e1", 0, json!({"result": "first"})).await;

        let flattened = buffers.drain_flattened("loop1", &["e1".to_string()]).await;
        assert_eq!(flattened, vec![json!({"result": "first"}), json!({"result": "second"})]);
    }

    #[tokio::test]
    async fn merges_multiple_edges_at_the_same_index() {
        let buffers = EdgeBuffers::new();
        buffers.push("loop1", "e1", 0, json!({"a": 1})).await;
        buffers.push("loop1", "e2", 0, json!({"b": 2})).await;

        let flattened = buffers
            .drain_flattened("loop1", &["e1".to_string(), "e2".to_string()])
            .await;
        assert_eq!(flattened, vec![json!({"a": 1, "b": 2})]);
    }

    #[tokio::test]
    async fn single_edge_scalar_payload_is_not_wrapped_in_an_object() {
        let buffers = EdgeBuffers::new();
        buffers.push("loop1", "e1", 0, json!(10)).await;
        buffers.push("loop1", "e1", 1, json!(20)).await;
        buffers.push("loop1", "e1", 2, json!(30)).await;

        let flattened = buffers.drain_flattened("loop1", &["e1".to_string()]).await;
        assert_eq!(flattened, vec![json!(10), json!(20), json!(30)]);
    }

    #[tokio::test]
    async fn empty_buffer_flattens_to_empty_vec() {
        let buffers = EdgeBuffers::new();
        let flattened = buffers.drain_flattened("never-touched", &[]).await;
        assert!(flattened.is_empty());
    }
}
