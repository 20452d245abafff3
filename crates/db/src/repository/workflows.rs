//! Workflow CRUD and persistent-state operations (spec §6.1).

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WorkflowRow, DbError};

/// Insert a new workflow into the database.
pub async fn create_workflow(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    nodes: Value,
    edges: Value,
    schedule_cron: Option<&str>,
    project_id: Option<Uuid>,
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        INSERT INTO workflows
            (id, user_id, name, nodes, edges, is_active, schedule_cron, project_id, persistent_state, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, false, $6, $7, '{}'::jsonb, $8, $8)
        RETURNING id, user_id, name, nodes, edges, is_active, schedule_cron, project_id, persistent_state, created_at, updated_at
        "#,
        id,
        user_id,
        name,
        nodes,
        edges,
        schedule_cron,
        project_id,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, user_id, name, nodes, edges, is_active, schedule_cron, project_id, persistent_state, created_at, updated_at
           FROM workflows WHERE id = $1"#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Every workflow with `is_active = true` and a non-null `schedule_cron` —
/// what the scheduler loads at startup (spec §4.5).
pub async fn list_active_scheduled(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, user_id, name, nodes, edges, is_active, schedule_cron, project_id, persistent_state, created_at, updated_at
           FROM workflows WHERE is_active = true AND schedule_cron IS NOT NULL"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, user_id, name, nodes, edges, is_active, schedule_cron, project_id, persistent_state, created_at, updated_at
           FROM workflows ORDER BY created_at DESC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the whole `persistent_state` bag and bump `updated_at` (spec
/// invariant 6 — writes must be durable before the next dependent node runs).
pub async fn update_persistent_state(
    pool: &PgPool,
    workflow_id: Uuid,
    state: &std::collections::HashMap<String, Value>,
) -> Result<(), DbError> {
    let encoded = serde_json::to_value(state).expect("HashMap<String, Value> always serialises");
    sqlx::query!(
        r#"UPDATE workflows SET persistent_state = $1, updated_at = $2 WHERE id = $3"#,
        encoded,
        Utc::now(),
        workflow_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Activate/deactivate a workflow and set (or clear) its cron schedule —
/// the write side of the scheduler's `schedule`/`unschedule` operations.
pub async fn set_schedule(
    pool: &PgPool,
    workflow_id: Uuid,
    is_active: bool,
    schedule_cron: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"UPDATE workflows SET is_active = $1, schedule_cron = $2, updated_at = $3 WHERE id = $4"#,
        is_active,
        schedule_cron,
        Utc::now(),
        workflow_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Permanently delete a workflow by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query!("DELETE FROM workflows WHERE id = $1", id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
