//! Queue error types (spec §6.2 external job queue).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// A job handler failed while processing a dequeued job.
    #[error("job handler failed: {0}")]
    Handler(String),
}
