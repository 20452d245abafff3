//! `Utility` category executor — the catch-all bucket `derive_category`
//! defaults unlisted node types into (spec §4.1): triggers, the scheduler's
//! entry node, chart/visualization sinks, static `Input` data, plus the two
//! node types that reuse `Http`'s plumbing under a different name
//! (`httprequest`, `webhook`).

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    http::{perform_request, webhook},
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct UtilityExecutor {
    client: reqwest::Client,
}

impl UtilityExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl CategoryExecutor for UtilityExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        match request.node_type.as_str() {
            // Trigger-like nodes have nothing to compute; their resolved
            // values (or, for a trigger, the incoming payload) pass through.
            "trigger" | "Scheduler" | "Visualize" | "Input" => {
                if request.resolved_values.is_null() {
                    Ok(request.input.clone())
                } else {
                    Ok(request.resolved_values.clone())
                }
            }
            "httprequest" => perform_request(&self.client, &request.resolved_values).await,
            "webhook" => deliver_webhook(&self.client, &request.resolved_values).await,
            other => Err(NodeError::Fatal(format!("unsupported Utility node type '{other}'"))),
        }
    }
}

async fn deliver_webhook(client: &reqwest::Client, values: &Value) -> Result<Value, NodeError> {
    let url = values
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| NodeError::Fatal("webhook node missing 'url'".into()))?;
    let webhook_id = values.get("webhookId").and_then(Value::as_str).unwrap_or("unknown");
    let event = values.get("event").and_then(Value::as_str).unwrap_or("workflow.webhook");
    let secret = values.get("secret").and_then(Value::as_str);
    let retry_attempts = values.get("retryAttempts").and_then(Value::as_u64).unwrap_or(3) as u32;
    let data = values.get("data").cloned().unwrap_or(Value::Null);
    let product_version = env!("CARGO_PKG_VERSION");

    let (attempts, success) =
        webhook::deliver(client, url, webhook_id, event, data, secret, retry_attempts, product_version).await;
    webhook::as_node_result(&attempts, success)
}
