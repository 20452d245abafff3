//! `queue` crate — the external job queue (spec §6.2), generalising
//! `db::repository::jobs` into a typed front door plus a worker-polling
//! loop. Deliberately has no dependency on `engine`: the CLI wires a
//! `JobHandler` to `engine::WorkflowExecutor`, keeping run-granularity
//! dispatch decoupled from node-granularity execution.

pub mod error;
pub mod job;
#[allow(clippy::module_inception)]
pub mod queue;

pub use error::QueueError;
pub use job::{backoff_delay, Job};
pub use queue::{JobHandler, JobQueue};
