//! Webhook registration and delivery audit (spec §6.1, §6.4).

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{WebhookDeliveryRow, WebhookRow},
    DbError,
};

pub async fn create_webhook(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    url: &str,
    secret: Option<&str>,
    events: &[String],
    headers: Value,
    retry_attempts: i32,
    timeout: i32,
) -> Result<WebhookRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        WebhookRow,
        r#"
        INSERT INTO webhooks (id, user_id, name, url, secret, events, headers, active, retry_attempts, timeout)
        VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8, $9)
        RETURNING id, user_id, name, url, secret, events, headers, active, retry_attempts, timeout
        "#,
        id,
        user_id,
        name,
        url,
        secret,
        events,
        headers,
        retry_attempts,
        timeout,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_webhook(pool: &PgPool, id: Uuid) -> Result<WebhookRow, DbError> {
    let row = sqlx::query_as!(
        WebhookRow,
        r#"SELECT id, user_id, name, url, secret, events, headers, active, retry_attempts, timeout
           FROM webhooks WHERE id = $1"#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Record one delivery outcome — one row per webhook firing, carrying the
/// total attempt count rather than a row per attempt (the per-attempt log
/// lives transiently in `nodes::http::webhook::DeliveryAttempt`).
pub async fn insert_delivery(
    pool: &PgPool,
    webhook_id: Uuid,
    payload: Value,
    success: bool,
    status_code: Option<i32>,
    error_message: Option<&str>,
    attempts: i32,
) -> Result<WebhookDeliveryRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WebhookDeliveryRow,
        r#"
        INSERT INTO webhook_deliveries (id, webhook_id, payload, success, status_code, error_message, attempts, delivered_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, webhook_id, payload, success, status_code, error_message, attempts, delivered_at
        "#,
        id,
        webhook_id,
        payload,
        success,
        status_code,
        error_message,
        attempts,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}
