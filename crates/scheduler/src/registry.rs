//! The cron-driven scheduler (spec §4.5): loads active scheduled workflows,
//! fires runs on their cron schedule, and survives process restarts by
//! reloading from the `workflows` table.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use db::DbPool;
use engine::adapters::{DbCredentialStore, TracingNotificationSink};
use engine::models::{NodeDefinition, Workflow};
use engine::{EngineError, ExecutorConfig, SchedulerConfig, WorkflowExecutor};
use nodes::NodeRegistry;

use crate::error::SchedulerError;

/// How often the scheduler loop wakes to check for due entries. Cron is
/// minute-precision (spec §6.4), a second is plenty of slack.
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

struct ScheduleEntry {
    user_id: Uuid,
    cron: String,
    schedule: Schedule,
    next_fire: DateTime<Utc>,
}

/// A snapshot row for [`Scheduler::list`].
#[derive(Debug, Clone)]
pub struct ScheduleListing {
    pub workflow_id: Uuid,
    pub user_id: Uuid,
    pub cron: String,
    pub next_fire_time: DateTime<Utc>,
}

/// In-memory cron registry plus the run-firing loop (spec §4.5).
pub struct Scheduler {
    pool: DbPool,
    node_registry: Arc<NodeRegistry>,
    executor_config: ExecutorConfig,
    config: SchedulerConfig,
    entries: DashMap<Uuid, ScheduleEntry>,
}

/// The `cron` crate expects a leading seconds field; the platform's wire
/// format (spec §6.4) is the usual 5-field minute-precision expression.
fn parse_schedule(expression: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(&format!("0 {expression}")).map_err(|e| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

fn next_fire_after(schedule: &Schedule, after: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
    schedule.after(&after).next().ok_or_else(|| SchedulerError::InvalidCron {
        expression: schedule.to_string(),
        reason: "expression never fires again".into(),
    })
}

impl Scheduler {
    #[must_use]
    pub fn new(pool: DbPool, node_registry: Arc<NodeRegistry>, executor_config: ExecutorConfig, config: SchedulerConfig) -> Self {
        Self {
            pool,
            node_registry,
            executor_config,
            config,
            entries: DashMap::new(),
        }
    }

    /// Loads every `is_active = true AND schedule_cron IS NOT NULL` workflow
    /// and registers it. Called once at process start.
    pub async fn load_active(&self) -> Result<usize, SchedulerError> {
        let rows = db::repository::workflows::list_active_scheduled(&self.pool).await?;
        let mut loaded = 0;
        for row in rows {
            let Some(cron_expr) = row.schedule_cron.clone() else { continue };
            match self.schedule(row.id, row.user_id, &cron_expr) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(workflow_id = %row.id, error = %e, "skipping unschedulable workflow on load"),
            }
        }
        info!(loaded, "scheduler loaded active workflows");
        Ok(loaded)
    }

    /// Cancels any existing entry for `workflow_id`, validates `cron`, and
    /// registers it. Validation computes `next_fire_time` and rejects
    /// expressions that never fire in the future.
    pub fn schedule(&self, workflow_id: Uuid, user_id: Uuid, cron_expr: &str) -> Result<(), SchedulerError> {
        let schedule = parse_schedule(cron_expr)?;
        let next_fire = next_fire_after(&schedule, Utc::now())?;
        self.entries.insert(
            workflow_id,
            ScheduleEntry { user_id, cron: cron_expr.to_string(), schedule, next_fire },
        );
        Ok(())
    }

    /// Removes `workflow_id` from the in-memory registry. Idempotent.
    pub fn unschedule(&self, workflow_id: Uuid) {
        self.entries.remove(&workflow_id);
    }

    /// Re-registers `workflow_id` with a new cron expression, or unschedules
    /// it when `cron` is `None`, persisting the change.
    pub async fn update(&self, workflow_id: Uuid, user_id: Uuid, cron_expr: Option<&str>) -> Result<(), SchedulerError> {
        match cron_expr {
            Some(expr) => {
                self.schedule(workflow_id, user_id, expr)?;
                db::repository::workflows::set_schedule(&self.pool, workflow_id, true, Some(expr)).await?;
            }
            None => {
                self.unschedule(workflow_id);
                db::repository::workflows::set_schedule(&self.pool, workflow_id, false, None).await?;
            }
        }
        Ok(())
    }

    /// Snapshot of every registered entry.
    #[must_use]
    pub fn list(&self) -> Vec<ScheduleListing> {
        self.entries
            .iter()
            .map(|e| ScheduleListing {
                workflow_id: *e.key(),
                user_id: e.user_id,
                cron: e.cron.clone(),
                next_fire_time: e.next_fire,
            })
            .collect()
    }

    /// Runs the fire loop until `shutdown` is signalled. Intended to be
    /// spawned as a long-lived background task.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.fire_due_entries().await,
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn fire_due_entries(&self) {
        let now = Utc::now();
        let due: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|e| e.next_fire <= now)
            .map(|e| *e.key())
            .collect();

        for workflow_id in due {
            let Some(mut entry) = self.entries.get_mut(&workflow_id) else { continue };
            match next_fire_after(&entry.schedule, now) {
                Ok(next) => entry.next_fire = next,
                Err(e) => {
                    warn!(%workflow_id, error = %e, "dropping schedule entry with no future fire time");
                    drop(entry);
                    self.entries.remove(&workflow_id);
                    continue;
                }
            }
            drop(entry);
            self.spawn_run(workflow_id);
        }
    }

    fn spawn_run(&self, workflow_id: Uuid) {
        let pool = self.pool.clone();
        let node_registry = self.node_registry.clone();
        let executor_config = self.executor_config.clone();
        let watchdog_timeout = self.config.watchdog_timeout;
        tokio::spawn(async move {
            if let Err(e) = fire_run(pool, node_registry, executor_config, watchdog_timeout, workflow_id).await {
                error!(%workflow_id, error = %e, "scheduled run failed to start");
            }
        });
    }
}

/// Creates a `running` run row, invokes the engine under a watchdog timeout,
/// and records the final status — the scheduler's per-fire lifecycle (spec
/// §4.5/§5). Dropping the executor's future on timeout aborts its in-flight
/// worker tasks (`tokio::task::JoinSet`'s drop behaviour), so no separate
/// cancellation signal needs to reach the engine.
async fn fire_run(
    pool: DbPool,
    node_registry: Arc<NodeRegistry>,
    executor_config: ExecutorConfig,
    watchdog_timeout: std::time::Duration,
    workflow_id: Uuid,
) -> Result<(), SchedulerError> {
    let row = db::repository::workflows::get_workflow(&pool, workflow_id).await?;
    let nodes: Vec<NodeDefinition> = serde_json::from_value(row.nodes.clone())
        .map_err(|e| SchedulerError::InvalidCronConfig(format!("malformed nodes column: {e}")))?;
    let edges = serde_json::from_value(row.edges.clone())
        .map_err(|e| SchedulerError::InvalidCronConfig(format!("malformed edges column: {e}")))?;
    let persistent_state = row
        .persistent_state_map()
        .map_err(|e| SchedulerError::InvalidCronConfig(format!("malformed persistent_state column: {e}")))?;

    let workflow = Workflow {
        id: row.id,
        user_id: row.user_id,
        name: row.name.clone(),
        nodes,
        edges,
        is_active: row.is_active,
        schedule_cron: row.schedule_cron.clone(),
        persistent_state,
        project_id: row.project_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };

    let run_row = db::repository::executions::create_run(&pool, workflow_id, None).await?;
    info!(run_id = %run_row.id, %workflow_id, "scheduler firing run");

    let executor = WorkflowExecutor::new(pool.clone(), node_registry, executor_config);
    let credentials = Arc::new(DbCredentialStore::new(pool.clone()));
    let notifications = Arc::new(TracingNotificationSink);

    let outcome = tokio::time::timeout(watchdog_timeout, executor.run(&workflow, run_row.id, credentials, notifications)).await;

    match outcome {
        Ok(Ok(_result)) => Ok(()),
        Ok(Err(e)) => Err(SchedulerError::Engine(e)),
        Err(_elapsed) => {
            warn!(run_id = %run_row.id, %workflow_id, "run exceeded watchdog timeout");
            let message = EngineError::WatchdogTimeout(watchdog_timeout).to_string();
            db::repository::executions::complete_run(&pool, run_row.id, "failed", None, Some(&message)).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_five_field_expression_parses() {
        assert!(parse_schedule("30 9 * * *").is_ok());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(parse_schedule("not a cron").is_err());
    }

    #[test]
    fn next_fire_is_strictly_after_the_reference_time() {
        let schedule = parse_schedule("*/5 * * * *").unwrap();
        let now = Utc::now();
        let next = next_fire_after(&schedule, now).unwrap();
        assert!(next > now);
    }
}
