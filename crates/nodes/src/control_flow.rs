//! `ControlFlow` category executor — `If`, `Switch`, `Loop`, `EditFields`,
//! `Math`, `Transform` (spec §4.1, §4.4.3, §4.4.4).
//!
//! `Loop` is special-cased by the engine's own loop-driving logic
//! (`engine::loops`); this executor passes its input through unchanged so
//! an accidental direct dispatch is harmless rather than a hard error.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    NodeError,
};

#[derive(Default)]
pub struct ControlFlowExecutor;

#[async_trait]
impl CategoryExecutor for ControlFlowExecutor {
    async fn execute(
        &self,
        request: &NodeExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        match request.node_type.as_str() {
            "If" => evaluate_if(&request.resolved_values),
            "Switch" => evaluate_switch(&request.resolved_values),
            "EditFields" => Ok(apply_edit_fields(&request.resolved_values, &request.input)),
            "Math" => evaluate_math(&request.resolved_values, &request.input),
            "Transform" => Ok(apply_transform(&request.resolved_values, &request.input)),
            "Loop" => Ok(request.input.clone()),
            other => Err(NodeError::Fatal(format!("unrecognised ControlFlow node type '{other}'"))),
        }
    }
}

/// `{conditions: [{left, operator, right}], logicalOp: "AND"|"OR"}`.
fn evaluate_if(values: &Value) -> Result<Value, NodeError> {
    let conditions = values
        .get("conditions")
        .and_then(Value::as_array)
        .ok_or_else(|| NodeError::Fatal("If node missing 'conditions'".into()))?;
    let logical_op = values.get("logicalOp").and_then(Value::as_str).unwrap_or("AND");

    let mut results = Vec::with_capacity(conditions.len());
    for condition in conditions {
        results.push(evaluate_condition(condition)?);
    }

    let passed = if logical_op == "OR" {
        results.iter().any(|&r| r)
    } else {
        results.iter().all(|&r| r)
    };

    Ok(json!(passed))
}

fn evaluate_condition(condition: &Value) -> Result<bool, NodeError> {
    let left = condition.get("left").cloned().unwrap_or(Value::Null);
    let right = condition.get("right").cloned().unwrap_or(Value::Null);
    let operator = condition.get("operator").and_then(Value::as_str).unwrap_or("==");

    let left_num = as_f64(&left);
    let right_num = as_f64(&right);

    let result = match (operator, left_num, right_num) {
        (">", Some(l), Some(r)) => l > r,
        (">=", Some(l), Some(r)) => l >= r,
        ("<", Some(l), Some(r)) => l < r,
        ("<=", Some(l), Some(r)) => l <= r,
        ("==", _, _) => left == right,
        ("!=", _, _) => left != right,
        (op, ..) => return Err(NodeError::Fatal(format!("unsupported If operator '{op}'"))),
    };
    Ok(result)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// `{cases: {caseKey: matchValue}, value}` → `{result: matchedCaseKey}`,
/// defaulting to `"default"` when nothing matches.
fn evaluate_switch(values: &Value) -> Result<Value, NodeError> {
    let subject = values.get("value").cloned().unwrap_or(Value::Null);
    let cases = values
        .get("cases")
        .and_then(Value::as_object)
        .ok_or_else(|| NodeError::Fatal("Switch node missing 'cases'".into()))?;

    for (case_key, match_value) in cases {
        if *match_value == subject {
            return Ok(json!({ "result": case_key }));
        }
    }
    Ok(json!({ "result": "default" }))
}

/// `{fields: {name: value}}` merged over the current input.
fn apply_edit_fields(values: &Value, input: &Value) -> Value {
    let mut merged = input.as_object().cloned().unwrap_or_default();
    if let Some(fields) = values.get("fields").and_then(Value::as_object) {
        for (k, v) in fields {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// `{op: "add"|"sub"|"mul"|"div", left, right}` — `left`/`right` are
/// already template-resolved by the time this runs.
fn evaluate_math(values: &Value, input: &Value) -> Result<Value, NodeError> {
    let op = values.get("op").and_then(Value::as_str).unwrap_or("add");
    let left = values
        .get("left")
        .and_then(as_f64)
        .or_else(|| as_f64(input))
        .ok_or_else(|| NodeError::Fatal("Math node 'left' is not numeric".into()))?;
    let right = values
        .get("right")
        .and_then(as_f64)
        .ok_or_else(|| NodeError::Fatal("Math node 'right' is not numeric".into()))?;

    let result = match op {
        "add" => left + right,
        "sub" => left - right,
        "mul" => left * right,
        "div" if right != 0.0 => left / right,
        "div" => return Err(NodeError::Fatal("Math node division by zero".into())),
        other => return Err(NodeError::Fatal(format!("unsupported Math op '{other}'"))),
    };
    Ok(json!(result))
}

/// `{value}` — returns the resolved `value` verbatim.
fn apply_transform(values: &Value, input: &Value) -> Value {
    values.get("value").cloned().unwrap_or_else(|| input.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_node_and_logic_requires_all_true() {
        let values = json!({
            "conditions": [
                {"left": 5, "operator": ">", "right": 3},
                {"left": 5, "operator": "<", "right": 3},
            ],
            "logicalOp": "AND",
        });
        assert_eq!(evaluate_if(&values).unwrap(), json!(false));
    }

    #[test]
    fn if_node_matches_scenario_s2() {
        let values = json!({
            "conditions": [{"left": 5, "operator": ">", "right": "3"}],
            "logicalOp": "AND",
        });
        assert_eq!(evaluate_if(&values).unwrap(), json!(true));
    }

    #[test]
    fn switch_falls_back_to_default() {
        let values = json!({"value": "z", "cases": {"a": "a", "b": "b"}});
        assert_eq!(evaluate_switch(&values).unwrap(), json!({"result": "default"}));
    }

    #[test]
    fn math_mul_matches_loop_body_scenario() {
        let values = json!({"op": "mul", "left": 2, "right": 10});
        assert_eq!(evaluate_math(&values, &Value::Null).unwrap(), json!(20.0));
    }
}
