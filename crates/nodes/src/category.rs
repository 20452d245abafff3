//! Node dispatch category — which `CategoryExecutor` in the [`crate::registry`]
//! handles a given node (spec §4.1).

use serde::{Deserialize, Serialize};

/// The dispatch key a node resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    DataSource,
    Indicator,
    Broker,
    Communication,
    ControlFlow,
    Utility,
    Http,
}

/// Recognised branching node types — their outgoing edges are selected by
/// result rather than all fired unconditionally.
pub const BRANCHING_TYPES: &[&str] = &["If", "Switch"];

/// The node type that drives iteration over an array, aggregating feedback
/// edges into a single `"done"` emission.
pub const LOOP_TYPE: &str = "Loop";

/// Derive a node's dispatch category from its `node_type` when the node
/// doesn't declare one explicitly. Mirrors the table in spec §4.1. Unknown
/// types default to `Utility` and are logged by the caller — new
/// integrations show up over time and a hard failure here would make
/// onboarding a new node type a breaking change.
#[must_use]
pub fn derive_category(node_type: &str) -> NodeCategory {
    match node_type {
        "If" | "Switch" | "Loop" | "EditFields" | "Math" | "Transform" => NodeCategory::ControlFlow,
        "Scheduler" | "trigger" | "Visualize" | "webhook" | "httprequest" => NodeCategory::Utility,
        "Gmail" | "WhatsApp" => NodeCategory::Communication,
        "FinnHub" | "YahooFinance" => NodeCategory::DataSource,
        _ => NodeCategory::Utility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_category_matches_table() {
        assert_eq!(derive_category("If"), NodeCategory::ControlFlow);
        assert_eq!(derive_category("Loop"), NodeCategory::ControlFlow);
        assert_eq!(derive_category("Scheduler"), NodeCategory::Utility);
        assert_eq!(derive_category("Gmail"), NodeCategory::Communication);
        assert_eq!(derive_category("FinnHub"), NodeCategory::DataSource);
        assert_eq!(derive_category("SomeUnknownType"), NodeCategory::Utility);
    }
}
