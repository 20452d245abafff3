//! Thin adapters from the `nodes` crate's context-collaborator traits onto
//! this crate's/`db`'s concrete types, so `nodes` never depends on `engine`
//! or `db` (spec §6.2 external collaborators).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use db::DbPool;
use nodes::traits::{CredentialStore, NotificationSink, PersistentStateAccess};
use nodes::NodeError;

use crate::state::PersistentState;

/// Exposes `engine::state::PersistentState` through the trait node executors
/// see.
pub struct PersistentStateAdapter(pub Arc<PersistentState>);

#[async_trait]
impl PersistentStateAccess for PersistentStateAdapter {
    async fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), NodeError> {
        self.0
            .set(key, value)
            .await
            .map_err(|e| NodeError::Retryable(format!("persistent state flush failed: {e}")))
    }
}

/// Fetches a credential row from Postgres. Decryption of envelope-encrypted
/// fields (spec §6.2) is a collaborator concern this repo does not implement;
/// the raw `client_json`/`token_json` columns are returned as-is.
pub struct DbCredentialStore {
    pool: DbPool,
}

impl DbCredentialStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for DbCredentialStore {
    async fn get_credential(&self, credential_id: &str) -> Result<Value, NodeError> {
        let id = Uuid::parse_str(credential_id)
            .map_err(|e| NodeError::Fatal(format!("invalid credential_id '{credential_id}': {e}")))?;
        let row = db::repository::credentials::get_credential(&self.pool, id)
            .await
            .map_err(|e| NodeError::Fatal(format!("credential lookup failed: {e}")))?;
        Ok(serde_json::json!({
            "service_type": row.service_type,
            "client": row.client_json,
            "token": row.token_json,
        }))
    }
}

/// Best-effort notification delivery (spec §6.2 "no ordering guaranteed").
/// A real pub/sub channel is an external collaborator this repo doesn't own;
/// this logs the way the teacher's executor logs node lifecycle events.
#[derive(Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, channel: &str, payload: Value) -> Result<(), NodeError> {
        tracing::info!(channel, %payload, "run notification");
        Ok(())
    }
}
