//! Outbound webhook delivery (spec §6.4): POST a JSON envelope, sign it
//! with HMAC-SHA256 when a secret is configured, retry with exponential
//! backoff `2^attempt` seconds up to `retry_attempts`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::NodeError;

type HmacSha256 = Hmac<Sha256>;

/// One delivery attempt's outcome, for the Run Audit sidecar.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

/// Compute `sha256=<hex HMAC-SHA256 of body>` for the `X-Webhook-Signature`
/// header.
#[must_use]
pub fn sign(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Deliver `data` to `url` as the spec §6.4 envelope, retrying up to
/// `retry_attempts` times. Returns the attempt history and whether the
/// final attempt succeeded (2xx).
pub async fn deliver(
    client: &reqwest::Client,
    url: &str,
    webhook_id: &str,
    event: &str,
    data: Value,
    secret: Option<&str>,
    retry_attempts: u32,
    product_version: &str,
) -> (Vec<DeliveryAttempt>, bool) {
    let body = json!({
        "event": event,
        "timestamp": Utc::now().to_rfc3339(),
        "data": data,
        "webhook_id": webhook_id,
    });
    let body_str = body.to_string();

    let max_attempts = retry_attempts.max(1);
    let mut attempts = Vec::new();
    for attempt in 1..=max_attempts {
        let mut builder = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("workflow-engine/{product_version}"));
        if let Some(secret) = secret {
            builder = builder.header("X-Webhook-Signature", sign(secret, &body_str));
        }

        match builder.body(body_str.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                attempts.push(DeliveryAttempt {
                    attempt,
                    status_code: Some(status.as_u16()),
                    error: None,
                });
                if status.is_success() {
                    return (attempts, true);
                }
            }
            Err(e) => {
                attempts.push(DeliveryAttempt {
                    attempt,
                    status_code: None,
                    error: Some(e.to_string()),
                });
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(std::time::Duration::from_secs(2u64.saturating_pow(attempt))).await;
        }
    }
    (attempts, false)
}

/// Translate a delivery outcome into the node's result value, or a
/// `NodeError` the engine's own per-node retry policy can act on.
pub fn as_node_result(attempts: &[DeliveryAttempt], success: bool) -> Result<Value, NodeError> {
    if success {
        Ok(json!({ "success": true, "attempts": attempts.len() }))
    } else {
        let last_error = attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_else(|| "delivery failed".into());
        Err(NodeError::Retryable(format!(
            "webhook delivery failed after {} attempts: {last_error}",
            attempts.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_hmac_sha256_hex() {
        // Scenario S6: secret "k", body P. Verified against an independent
        // HMAC computation rather than a hardcoded digest.
        let body = json!({"hello": "world"}).to_string();
        let signature = sign("k", &body);
        assert!(signature.starts_with("sha256="));

        let mut mac = HmacSha256::new_from_slice(b"k").unwrap();
        mac.update(body.as_bytes());
        let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        assert_eq!(signature, expected);
    }

    #[test]
    fn as_node_result_reports_success() {
        let attempts = vec![DeliveryAttempt { attempt: 1, status_code: Some(200), error: None }];
        let result = as_node_result(&attempts, true).unwrap();
        assert_eq!(result["success"], json!(true));
    }

    #[test]
    fn as_node_result_is_retryable_on_failure() {
        let attempts = vec![DeliveryAttempt {
            attempt: 1,
            status_code: None,
            error: Some("connection refused".into()),
        }];
        assert!(matches!(as_node_result(&attempts, false), Err(NodeError::Retryable(_))));
    }
}
