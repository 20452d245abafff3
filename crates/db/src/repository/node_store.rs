//! Node Store (spec §4.6) — durable per-run sidecar used by the engine's
//! children-done gate and for crash-time diagnostics. Backed by the same
//! `node_executions` table as the Run Audit sink: "state" and "output" read
//! back the most recent row for `(run_id, node_id)`.
//!
//! Writes here are fire-and-forget from the worker's perspective — callers
//! log failures via `tracing::warn!` rather than propagating them, per spec.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// The most recent `status` recorded for a node in this run, if any attempt
/// has been recorded yet.
pub async fn get_node_state(pool: &PgPool, run_id: Uuid, node_id: &str) -> Result<Option<String>, DbError> {
    let status = sqlx::query_scalar!(
        r#"SELECT status FROM node_executions WHERE run_id = $1 AND node_id = $2 ORDER BY attempt DESC LIMIT 1"#,
        run_id,
        node_id,
    )
    .fetch_optional(pool)
    .await?;

    Ok(status)
}

/// Update the status of the latest attempt row for `(run_id, node_id)`.
/// Used by the children-done gate, which only cares about a node's most
/// recent terminal state, not its full attempt history.
pub async fn set_node_state(pool: &PgPool, run_id: Uuid, node_id: &str, state: &str) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions SET status = $1
        WHERE id = (
            SELECT id FROM node_executions
            WHERE run_id = $2 AND node_id = $3
            ORDER BY attempt DESC LIMIT 1
        )
        "#,
        state,
        run_id,
        node_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// The latest successful output payload recorded for `(run_id, node_id)`.
pub async fn get_node_output(pool: &PgPool, run_id: Uuid, node_id: &str) -> Result<Option<Value>, DbError> {
    let output = sqlx::query_scalar!(
        r#"SELECT output_payload FROM node_executions WHERE run_id = $1 AND node_id = $2 ORDER BY attempt DESC LIMIT 1"#,
        run_id,
        node_id,
    )
    .fetch_optional(pool)
    .await?
    .flatten();

    Ok(output)
}

/// Overwrite the output payload of the latest attempt row.
pub async fn set_node_output(pool: &PgPool, run_id: Uuid, node_id: &str, payload: Value) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions SET output_payload = $1
        WHERE id = (
            SELECT id FROM node_executions
            WHERE run_id = $2 AND node_id = $3
            ORDER BY attempt DESC LIMIT 1
        )
        "#,
        payload,
        run_id,
        node_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}
