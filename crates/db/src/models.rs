//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows (spec §6.1)
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub nodes: serde_json::Value,
    pub edges: serde_json::Value,
    pub is_active: bool,
    pub schedule_cron: Option<String>,
    pub project_id: Option<Uuid>,
    pub persistent_state: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    /// Decode `persistent_state` into the map the engine keeps in memory.
    ///
    /// # Errors
    /// Returns `serde_json::Error` if the column doesn't hold a JSON object.
    pub fn persistent_state_map(&self) -> Result<HashMap<String, serde_json::Value>, serde_json::Error> {
        serde_json::from_value(self.persistent_state.clone())
    }
}

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow run (spec §3 `Run.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A persisted workflow run row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub initiated_by: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution row — one per attempt, append-only (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub node_id: String,
    pub status: String,
    pub input_payload: serde_json::Value,
    pub output_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempt: i32,
}

// ---------------------------------------------------------------------------
// user_credentials
// ---------------------------------------------------------------------------

/// A persisted credential row (spec §6.1). Decryption of envelope-encrypted
/// fields is left to whatever `CredentialStore` adapter wraps this table —
/// this crate stores and fetches ciphertext, it never decrypts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserCredentialRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_type: String,
    pub name: String,
    pub client_json: serde_json::Value,
    pub token_json: serde_json::Value,
    pub scopes: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// webhooks / webhook_deliveries (spec §6.1, §6.4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: Option<String>,
    pub events: Vec<String>,
    pub headers: serde_json::Value,
    pub active: bool,
    pub retry_attempts: i32,
    pub timeout: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDeliveryRow {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub payload: serde_json::Value,
    pub success: bool,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub delivered_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// Possible statuses for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLettered,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

/// A job row fetched from the queue table: `{runId, workflowId, userId,
/// nodes, edges, trigger}` per spec §6.2, enqueued by the scheduler or API
/// and drained by the `queue` crate's worker loop.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub workflow_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
