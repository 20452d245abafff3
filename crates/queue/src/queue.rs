//! The external job queue (spec §6.2): a thin, typed wrapper over
//! `db::repository::jobs`, plus the generic worker-polling loop the CLI's
//! `worker` subcommand drives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use db::DbPool;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::{backoff_delay, Job};

/// How often the worker polls for a pending job when the queue is empty.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Handles one dequeued job. Implemented by the CLI binary, which wires it
/// to `engine::WorkflowExecutor` — the `queue` crate itself has no
/// dependency on `engine` (spec §2 "the engine itself never depends on it").
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), QueueError>;
}

/// Typed front door onto the `job_queue` table.
#[derive(Clone)]
pub struct JobQueue {
    pool: DbPool,
}

impl JobQueue {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, run_id: Uuid, workflow_id: Uuid, user_id: Uuid, payload: serde_json::Value) -> Result<Job, QueueError> {
        db::repository::jobs::enqueue_job(&self.pool, run_id, workflow_id, user_id, payload)
            .await
            .map_err(QueueError::from)
    }

    pub async fn fetch_next(&self) -> Result<Option<Job>, QueueError> {
        db::repository::jobs::fetch_next_job(&self.pool).await.map_err(QueueError::from)
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        db::repository::jobs::complete_job(&self.pool, job_id).await.map_err(QueueError::from)
    }

    pub async fn fail(&self, job_id: Uuid, max_attempts: i32) -> Result<(), QueueError> {
        db::repository::jobs::fail_job(&self.pool, job_id, max_attempts).await.map_err(QueueError::from)
    }

    /// Polls for pending jobs and runs `handler` on each, until `shutdown`
    /// fires. On handler failure, dead-letters the job once `max_attempts`
    /// is reached, else sleeps the exponential backoff delay before the next
    /// poll (spec §6.2).
    pub async fn run_worker(&self, handler: Arc<dyn JobHandler>, mut shutdown: watch::Receiver<bool>) {
        self.run_worker_with_interval(handler, DEFAULT_POLL_INTERVAL, &mut shutdown).await;
    }

    async fn run_worker_with_interval(&self, handler: Arc<dyn JobHandler>, poll_interval: Duration, shutdown: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.fetch_next().await {
                Ok(Some(job)) => {
                    info!(job_id = %job.id, run_id = %job.run_id, "dequeued job");
                    match handler.handle(&job).await {
                        Ok(()) => {
                            if let Err(e) = self.complete(job.id).await {
                                error!(job_id = %job.id, error = %e, "failed to mark job completed");
                            }
                        }
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "job handler failed");
                            if let Err(e) = self.fail(job.id, job.max_attempts).await {
                                error!(job_id = %job.id, error = %e, "failed to mark job failed");
                            }
                            tokio::time::sleep(backoff_delay(job.attempts)).await;
                        }
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = shutdown.changed() => break,
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to fetch next job");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }
}
