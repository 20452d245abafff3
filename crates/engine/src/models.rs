//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory. They serialise to/from the JSONB `definition` column of the
//! `workflows` table (see `db::models::WorkflowRow`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use nodes::{derive_category, NodeCategory, BRANCHING_TYPES, LOOP_TYPE};

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// A single node in a workflow graph.
///
/// `id` is stable and human-readable; it doubles as the reference name used
/// in `{{ $('Id').json.path }}` templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    pub node_type: String,
    /// Explicit dispatch category. Derived from `node_type` via
    /// [`derive_category`] when absent.
    #[serde(default)]
    pub category: Option<NodeCategory>,
    #[serde(default)]
    pub position: Option<(f64, f64)>,
    /// Parameter bag; string fields may contain `{{ ... }}` templates.
    #[serde(default)]
    pub values: serde_json::Value,
    /// Editor-bound metadata, also used as the default input for the node
    /// (spec §4.4.2 input assembly starts from `node.data`).
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NodeDefinition {
    /// Resolve this node's dispatch category.
    #[must_use]
    pub fn category(&self) -> NodeCategory {
        self.category.unwrap_or_else(|| derive_category(&self.node_type))
    }

    /// Display name used by the reference resolver when a template refers to
    /// a node by name rather than by ID: `values.label`, falling back to the
    /// node type, per spec §4.2.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.values
            .get("label")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| self.node_type.clone())
    }

    /// Whether this node's `node_type` is a recognised branching type.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        BRANCHING_TYPES.contains(&self.node_type.as_str())
    }

    /// Whether this node is a `Loop` node.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        self.node_type == LOOP_TYPE
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A directed connection between two nodes. `source_handle` discriminates
/// branching outputs (`"true"`/`"false"`, `"case1"`, `"loop"`, `"done"`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub schedule_cron: Option<String>,
    #[serde(default)]
    pub persistent_state: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for tests.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        nodes: Vec<NodeDefinition>,
        edges: Vec<Edge>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            nodes,
            edges,
            is_active: false,
            schedule_cron: None,
            persistent_state: HashMap::new(),
            project_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a node by ID.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes with no incoming edges — the run's source nodes.
    #[must_use]
    pub fn source_nodes(&self) -> Vec<&NodeDefinition> {
        let targets: std::collections::HashSet<&str> =
            self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub initiated_by: Option<Uuid>,
    pub error_message: Option<String>,
    pub result: HashMap<String, serde_json::Value>,
}

impl Run {
    #[must_use]
    pub fn new(workflow_id: Uuid, initiated_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            initiated_by,
            error_message: None,
            result: HashMap::new(),
        }
    }
}
