//! `Communication` category executor — notification fan-out (`Gmail`,
//! `WhatsApp`) via the context's `NotificationSink` rather than talking to
//! vendor APIs directly; transport is a concern of whatever `NotificationSink`
//! the host wires in (spec §1, Non-goals: no email/SMS provider SDKs).

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct CommunicationExecutor;

#[async_trait]
impl CategoryExecutor for CommunicationExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        let channel = match request.node_type.as_str() {
            "Gmail" => "gmail",
            "WhatsApp" => "whatsapp",
            other => return Err(NodeError::Fatal(format!("unsupported Communication node type '{other}'"))),
        };
        ctx.notifications.notify(channel, request.resolved_values.clone()).await?;
        Ok(serde_json::json!({ "sent": true, "channel": channel }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::NoopNotificationSink;
    use crate::traits::{CredentialStore, PersistentStateAccess};
    use std::sync::Arc;

    struct NoopState;
    #[async_trait]
    impl PersistentStateAccess for NoopState {
        async fn get(&self, _key: &str) -> Option<Value> {
            None
        }
        async fn set(&self, _key: &str, _value: Value) -> Result<(), NodeError> {
            Ok(())
        }
    }
    struct NoopCreds;
    #[async_trait]
    impl CredentialStore for NoopCreds {
        async fn get_credential(&self, _credential_id: &str) -> Result<Value, NodeError> {
            Ok(Value::Null)
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            user_id: uuid::Uuid::new_v4(),
            workflow_id: uuid::Uuid::new_v4(),
            run_id: uuid::Uuid::new_v4(),
            state: Arc::new(NoopState),
            credentials: Arc::new(NoopCreds),
            notifications: Arc::new(NoopNotificationSink),
        }
    }

    #[tokio::test]
    async fn gmail_routes_through_notification_sink() {
        let request = NodeExecutionRequest {
            node_id: "n1".into(),
            node_type: "Gmail".into(),
            resolved_values: serde_json::json!({"to": "a@b.com"}),
            input: Value::Null,
        };
        let result = CommunicationExecutor.execute(&request, &ctx()).await.unwrap();
        assert_eq!(result["channel"], serde_json::json!("gmail"));
    }

    #[tokio::test]
    async fn unknown_type_is_fatal() {
        let request = NodeExecutionRequest {
            node_id: "n1".into(),
            node_type: "Slack".into(),
            resolved_values: Value::Null,
            input: Value::Null,
        };
        assert!(CommunicationExecutor.execute(&request, &ctx()).await.is_err());
    }
}
