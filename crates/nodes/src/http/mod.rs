//! `Http` category executor — generic outbound HTTP calls (spec §4.1; also
//! backs the `httprequest` node type dispatched through `Utility`).

pub mod webhook;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

/// Executes a `{method, url, headers?, body?}` request described in
/// `resolved_values` and returns `{status, body}`.
#[derive(Default)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl CategoryExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        perform_request(&self.client, &request.resolved_values).await
    }
}

pub(crate) async fn perform_request(client: &reqwest::Client, values: &Value) -> Result<Value, NodeError> {
    let method = values
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("GET")
        .to_uppercase();
    let url = values
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| NodeError::Fatal("httprequest node missing 'url'".into()))?;

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|e| NodeError::Fatal(format!("invalid HTTP method '{method}': {e}")))?;

    let mut builder = client.request(method, url);
    if let Some(headers) = values.get("headers").and_then(Value::as_object) {
        for (k, v) in headers {
            if let Some(v) = v.as_str() {
                builder = builder.header(k, v);
            }
        }
    }
    if let Some(body) = values.get("body") {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| NodeError::Retryable(format!("HTTP request failed: {e}")))?;
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status >= 500 {
        return Err(NodeError::Retryable(format!("upstream returned {status}")));
    }

    Ok(serde_json::json!({ "status": status, "body": body }))
}
