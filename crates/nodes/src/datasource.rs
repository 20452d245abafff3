//! `DataSource` category executor. Built-ins (`FinnHub`, `YahooFinance`)
//! fetch market data over HTTP using a credential looked up from the
//! context's `CredentialStore`; the vendor-specific payload shape is out of
//! scope (spec §1) — this module ships the HTTP plumbing and credential
//! gating only.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    http::perform_request,
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct DataSourceExecutor {
    client: reqwest::Client,
}

impl DataSourceExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl CategoryExecutor for DataSourceExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        match request.node_type.as_str() {
            "FinnHub" | "YahooFinance" => fetch(&self.client, request, ctx).await,
            other => Err(NodeError::Fatal(format!("unsupported DataSource node type '{other}'"))),
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    request: &NodeExecutionRequest,
    ctx: &ExecutionContext,
) -> Result<Value, NodeError> {
    if let Some(credential_id) = request.resolved_values.get("credential_id").and_then(Value::as_str) {
        // Resolve once so a missing/expired credential fails as a config
        // error rather than a confusing 401 from the vendor.
        ctx.credentials.get_credential(credential_id).await?;
    }
    perform_request(client, &request.resolved_values).await
}
