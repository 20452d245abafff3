//! CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `worker`   — start a queue worker that drains `job_queue` and drives
//!   the engine.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow JSON file.
//! - `schedule` — load active scheduled workflows and run the cron-fire
//!   loop until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use engine::adapters::{DbCredentialStore, TracingNotificationSink};
use engine::{ExecutorConfig, SchedulerConfig, WorkflowExecutor};
use queue::{Job, JobHandler, JobQueue, QueueError};

#[derive(Parser)]
#[command(name = "workflow-engine", about = "Workflow automation engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Start a background worker that processes queued jobs.
    Worker {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Load active scheduled workflows and fire runs on their cron schedule.
    Schedule {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
    },
}

/// Drives one dequeued job through the engine: loads the workflow, builds a
/// `WorkflowExecutor`, and runs it to completion.
struct EngineJobHandler {
    pool: db::DbPool,
    registry: Arc<nodes::NodeRegistry>,
    executor_config: ExecutorConfig,
}

#[async_trait]
impl JobHandler for EngineJobHandler {
    async fn handle(&self, job: &Job) -> Result<(), QueueError> {
        let row = db::repository::workflows::get_workflow(&self.pool, job.workflow_id).await?;
        let nodes: Vec<engine::models::NodeDefinition> =
            serde_json::from_value(row.nodes.clone()).map_err(|e| QueueError::Handler(format!("malformed nodes: {e}")))?;
        let edges: Vec<engine::models::Edge> =
            serde_json::from_value(row.edges.clone()).map_err(|e| QueueError::Handler(format!("malformed edges: {e}")))?;
        let persistent_state = row
            .persistent_state_map()
            .map_err(|e| QueueError::Handler(format!("malformed persistent_state: {e}")))?;

        let workflow = engine::models::Workflow {
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

        let executor = WorkflowExecutor::new(self.pool.clone(), self.registry.clone(), self.executor_config.clone());
        let credentials = Arc::new(DbCredentialStore::new(self.pool.clone()));
        let notifications = Arc::new(TracingNotificationSink);

        executor
            .run(&workflow, job.run_id, credentials, notifications)
            .await
            .map_err(|e| QueueError::Handler(e.to_string()))?;
        Ok(())
    }
}

async fn connect(database_url: &str, max_connections: u32) -> Result<db::DbPool> {
    db::pool::create_pool(database_url, max_connections)
        .await
        .context("failed to connect to database")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url } => {
            info!("Starting API server on {bind}");
            let pool = connect(&database_url, 10).await?;
            api::serve(&bind, pool).await.context("API server failed")?;
        }
        Command::Worker { database_url } => {
            info!("Starting background worker");
            let pool = connect(&database_url, 10).await?;
            let job_queue = JobQueue::new(pool.clone());
            let handler = Arc::new(EngineJobHandler {
                pool,
                registry: Arc::new(nodes::NodeRegistry::with_builtins()),
                executor_config: ExecutorConfig::default(),
            });
            let (_tx, rx) = watch::channel(false);
            job_queue.run_worker(handler, rx).await;
        }
        Command::Schedule { database_url } => {
            info!("Starting cron scheduler");
            let pool = connect(&database_url, 10).await?;
            let node_registry = Arc::new(nodes::NodeRegistry::with_builtins());
            let sched = Arc::new(scheduler::Scheduler::new(
                pool,
                node_registry,
                ExecutorConfig::default(),
                SchedulerConfig::default(),
            ));
            let loaded = sched.load_active().await.context("failed to load active schedules")?;
            info!(loaded, "scheduler ready");

            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                let _ = tx.send(true);
            });
            sched.run(rx).await;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            let pool = connect(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            #[derive(serde::Deserialize)]
            struct GraphFile {
                nodes: Vec<engine::models::NodeDefinition>,
                #[serde(default)]
                edges: Vec<engine::models::Edge>,
            }

            let content =
                std::fs::read_to_string(&path).with_context(|| format!("cannot read file {}", path.display()))?;
            let graph: GraphFile = serde_json::from_str(&content).context("invalid JSON")?;

            let workflow = engine::models::Workflow::new(Uuid::nil(), "validate", graph.nodes, graph.edges);
            match engine::validate_dag(&workflow) {
                Ok(order) => println!("workflow is valid; execution order: {order:?}"),
                Err(e) => {
                    eprintln!("validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
