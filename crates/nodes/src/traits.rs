//! The `CategoryExecutor` trait — the contract every node-category executor
//! fulfils — and the context it receives (spec §4.1).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::NodeError;

/// Everything a category executor needs to run one node. Reference
/// resolution (spec §4.2) happens upstream, in the engine, before this
/// request is built — by the time a node executor sees `resolved_values`
/// every `{{ ... }}` template it contains has already been substituted.
#[derive(Debug, Clone)]
pub struct NodeExecutionRequest {
    pub node_id: String,
    pub node_type: String,
    /// `node.values` with every template resolved.
    pub resolved_values: Value,
    /// The assembled input payload (spec §4.4.2 input assembly).
    pub input: Value,
}

/// Read/write access to a workflow's persistent state bag, as seen by node
/// executors. Implemented by `engine::state::PersistentState` via a thin
/// adapter so this crate never depends on `engine`.
#[async_trait]
pub trait PersistentStateAccess: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value) -> Result<(), NodeError>;
}

/// Looks up a stored credential by ID (spec §6.2 — credential storage is an
/// external collaborator the engine never implements directly).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, credential_id: &str) -> Result<Value, NodeError>;
}

/// Outbound delivery for `Communication`-category nodes (chat, email).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, channel: &str, payload: Value) -> Result<(), NodeError>;
}

/// Shared context passed to every node during execution (spec §4.1's
/// `context`: `{userId, workflowId, runId, persistentState, ...}`).
#[derive(Clone)]
pub struct ExecutionContext {
    pub user_id: Uuid,
    pub workflow_id: Uuid,
    pub run_id: Uuid,
    pub state: Arc<dyn PersistentStateAccess>,
    pub credentials: Arc<dyn CredentialStore>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl ExecutionContext {
    pub async fn get_persistent_value(&self, key: &str) -> Option<Value> {
        self.state.get(key).await
    }

    pub async fn set_persistent_value(&self, key: &str, value: Value) -> Result<(), NodeError> {
        self.state.set(key, value).await
    }
}

/// One category's executor (spec §4.1 — `DataSource`, `Indicator`,
/// `Broker`, `Communication`, `ControlFlow`, `Utility`, `Http`).
#[async_trait]
pub trait CategoryExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError>;
}
