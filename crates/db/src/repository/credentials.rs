//! Credential storage (spec §6.1 `user_credentials`, §6.2 Credential Store).
//!
//! This crate stores and fetches credential rows verbatim; envelope
//! decryption of `token_json`/`client_json` is left to whatever
//! `CredentialStore` adapter wraps these functions (spec: "out of scope").

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::UserCredentialRow, DbError};

pub async fn get_credential(pool: &PgPool, id: Uuid) -> Result<UserCredentialRow, DbError> {
    let row = sqlx::query_as!(
        UserCredentialRow,
        r#"SELECT id, user_id, service_type, name, client_json, token_json, scopes
           FROM user_credentials WHERE id = $1"#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

pub async fn list_credentials(
    pool: &PgPool,
    user_id: Uuid,
    service_type: Option<&str>,
) -> Result<Vec<UserCredentialRow>, DbError> {
    let rows = sqlx::query_as!(
        UserCredentialRow,
        r#"SELECT id, user_id, service_type, name, client_json, token_json, scopes
           FROM user_credentials
           WHERE user_id = $1 AND ($2::text IS NULL OR service_type = $2)"#,
        user_id,
        service_type,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
