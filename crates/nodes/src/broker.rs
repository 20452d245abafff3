//! `Broker` category executor — order placement/cancellation against a
//! brokerage API. Like `DataSource`, the vendor-specific payload shape is
//! external (spec §1); this ships the HTTP plumbing and credential gating.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    http::perform_request,
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct BrokerExecutor {
    client: reqwest::Client,
}

impl BrokerExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl CategoryExecutor for BrokerExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        if let Some(credential_id) = request.resolved_values.get("credential_id").and_then(Value::as_str) {
            ctx.credentials.get_credential(credential_id).await?;
        }
        perform_request(&self.client, &request.resolved_values).await
    }
}
