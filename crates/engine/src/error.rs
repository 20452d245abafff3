//! Engine-level error types (spec §7 error taxonomy).

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation / ConfigError kind ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// A non-Loop cycle was detected at pre-flight (spec §4.4.5 / §7 CycleError).
    #[error("workflow graph contains a non-loop cycle")]
    CycleDetected,

    /// The workflow has no nodes without incoming edges.
    #[error("workflow has no source nodes")]
    NoSources,

    // ------ Execution errors ------

    /// A node failed with a fatal error; the whole execution is aborted.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal { node_id: String, message: String },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted { node_id: String, message: String },

    /// No executor is registered for the node's resolved category.
    #[error("node '{node_id}' has unsupported category: {message}")]
    UnsupportedCategory { node_id: String, message: String },

    /// The readiness-retry counter for a node crossed the safety bound
    /// (spec §4.4.2 / §7 DependencyStall). Fatal for the run.
    #[error("node '{node_id}' stalled waiting on dependencies after {attempts} retries")]
    DependencyStall { node_id: String, attempts: u32 },

    /// The scheduler's per-run watchdog cancelled the run (spec §5 / §7).
    #[error("run exceeded watchdog timeout of {0:?}")]
    WatchdogTimeout(std::time::Duration),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
