//! Default stand-ins for the context collaborators (spec §6.2) used when a
//! real credential store or notification sink hasn't been wired up — e.g.
//! in tests, or a `cli validate` run that never touches external systems.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::{
    traits::{CredentialStore, NotificationSink, PersistentStateAccess},
    NodeError,
};

/// In-memory stand-in for a workflow's persistent state bag — no flush to
/// storage, so it's only fit for tests and non-run contexts like `cli validate`.
#[derive(Default)]
pub struct NoopPersistentState(Mutex<HashMap<String, Value>>);

#[async_trait]
impl PersistentStateAccess for NoopPersistentState {
    async fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), NodeError> {
        self.0.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Always fails — a node asking for a credential with no store configured
/// is a configuration error, not a transient one.
pub struct NoopCredentialStore;

#[async_trait]
impl CredentialStore for NoopCredentialStore {
    async fn get_credential(&self, credential_id: &str) -> Result<Value, NodeError> {
        Err(NodeError::Fatal(format!(
            "no credential store configured; cannot resolve '{credential_id}'"
        )))
    }
}

/// Logs and succeeds rather than failing the run.
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify(&self, channel: &str, payload: Value) -> Result<(), NodeError> {
        tracing::debug!(channel, ?payload, "noop notification sink: dropping message");
        Ok(())
    }
}
