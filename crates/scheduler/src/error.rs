//! Scheduler error types (spec §7 ConfigError family, scheduler side).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No node of type `Scheduler` was found in the workflow.
    #[error("workflow has no Scheduler node")]
    MissingSchedulerNode,

    /// More than one `Scheduler` node was found; the derivation is ambiguous.
    #[error("workflow has {0} Scheduler nodes, expected exactly one")]
    MultipleSchedulerNodes(usize),

    /// The Scheduler node's `values` don't describe a valid cron derivation.
    #[error("invalid scheduler configuration: {0}")]
    InvalidCronConfig(String),

    /// A cron expression failed to parse or never fires in the future.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// Engine-level error surfaced while deriving or validating a schedule.
    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
