//! `Indicator` category executor. Ships one built-in: Wilder's RSI, the
//! indicator referenced by the linear-RSI scenario in spec §8.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct IndicatorExecutor;

#[async_trait]
impl CategoryExecutor for IndicatorExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        let indicator = request
            .resolved_values
            .get("indicator")
            .and_then(Value::as_str)
            .unwrap_or("RSI");

        match indicator {
            "RSI" => compute_rsi(&request.resolved_values),
            other => Err(NodeError::Fatal(format!("unsupported indicator '{other}'"))),
        }
    }
}

/// Wilder's RSI over `values.prices` with `values.period` (default 14).
fn compute_rsi(values: &Value) -> Result<Value, NodeError> {
    let prices: Vec<f64> = values
        .get("prices")
        .and_then(Value::as_array)
        .ok_or_else(|| NodeError::Fatal("RSI node missing 'prices'".into()))?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| NodeError::Fatal("RSI price is not numeric".into())))
        .collect::<Result<_, _>>()?;

    let period = values.get("period").and_then(Value::as_u64).unwrap_or(14) as usize;

    if prices.len() <= period {
        return Err(NodeError::Fatal(format!(
            "RSI needs more than {period} prices, got {}",
            prices.len()
        )));
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for window in prices.windows(2).take(period) {
        let delta = window[1] - window[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    for window in prices.windows(2).skip(period) {
        let delta = window[1] - window[0];
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    };

    Ok(json!({ "indicator": "RSI", "values": [rsi] }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_over_fifteen_prices_with_period_fourteen() {
        let prices: Vec<f64> = (1..=15).map(f64::from).collect();
        let values = json!({"period": 14, "prices": prices});
        let result = compute_rsi(&values).unwrap();
        assert_eq!(result["indicator"], json!("RSI"));
        assert_eq!(result["values"].as_array().unwrap().len(), 1);
        // Strictly increasing prices: no losses, RSI saturates at 100.
        assert_eq!(result["values"][0], json!(100.0));
    }

    #[test]
    fn rsi_rejects_too_few_prices() {
        let values = json!({"period": 14, "prices": [1, 2, 3]});
        assert!(compute_rsi(&values).is_err());
    }
}
