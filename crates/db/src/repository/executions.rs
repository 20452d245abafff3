//! Run and node-execution repository functions (spec §4.7 Run Audit).

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NodeExecutionRow, WorkflowRunRow},
    DbError,
};

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Create a new run row in `running` status — the caller (scheduler or API)
/// owns this insert; the engine only updates it to a terminal state.
pub async fn create_run(
    pool: &PgPool,
    workflow_id: Uuid,
    initiated_by: Option<Uuid>,
) -> Result<WorkflowRunRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowRunRow,
        r#"
        INSERT INTO workflow_runs (id, workflow_id, status, started_at, initiated_by)
        VALUES ($1, $2, 'running', $3, $4)
        RETURNING id, workflow_id, status, started_at, completed_at, error_message, result, initiated_by
        "#,
        id,
        workflow_id,
        now,
        initiated_by,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Finalise a run — exactly one terminal update per run (testable property 4).
pub async fn complete_run(
    pool: &PgPool,
    run_id: Uuid,
    status: &str,
    result: Option<Value>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE workflow_runs
        SET status = $1, completed_at = $2, result = $3, error_message = $4
        WHERE id = $5
        "#,
        status,
        Utc::now(),
        result,
        error_message,
        run_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_run(pool: &PgPool, run_id: Uuid) -> Result<WorkflowRunRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRunRow,
        r#"SELECT id, workflow_id, status, started_at, completed_at, error_message, result, initiated_by
           FROM workflow_runs WHERE id = $1"#,
        run_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// Insert a `running` audit row for one attempt.
pub async fn start_node_execution(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
    input_payload: Value,
    attempt: i32,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, run_id, node_id, status, input_payload, output_payload, error_message, started_at, finished_at, attempt)
        VALUES ($1, $2, $3, 'running', $4, NULL, NULL, $5, NULL, $6)
        RETURNING id, run_id, node_id, status, input_payload, output_payload, error_message, started_at, finished_at, attempt
        "#,
        id,
        run_id,
        node_id,
        input_payload,
        now,
        attempt,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Finalise one attempt's audit row (`completed` or `failed`).
pub async fn finish_node_execution(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
    output_payload: Option<Value>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions
        SET status = $1, output_payload = $2, error_message = $3, finished_at = $4
        WHERE id = $5
        "#,
        status,
        output_payload,
        error_message,
        Utc::now(),
        execution_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// All attempts recorded for `(run_id, node_id)`, ordered by attempt number
/// (testable property 5 — attempts are a prefix of the naturals from 1).
pub async fn node_execution_history(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"SELECT id, run_id, node_id, status, input_payload, output_payload, error_message, started_at, finished_at, attempt
           FROM node_executions WHERE run_id = $1 AND node_id = $2 ORDER BY attempt ASC"#,
        run_id,
        node_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
