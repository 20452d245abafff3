//! Reference resolver — evaluates `{{ ... }}` expressions embedded in a
//! node's parameter values against the current item and upstream node
//! outputs (spec §4.2).
//!
//! Two reference forms are recognised:
//! - `$json.path` — the current input item.
//! - `$('Name').json.path` — another node's output, looked up by ID or
//!   display name.
//!
//! Values are resolved recursively through objects and arrays. Keys listed
//! in [`RESERVED_KEYS`] are passed through untouched — they carry
//! structural meaning (which credential to use, which operation to run)
//! rather than runtime data, and a literal `{{` in one of them is never a
//! template.

pub mod path;

use std::collections::HashMap;

use serde_json::Value;

use self::path::{get_path, parse_path};

/// Keys whose value is never template-resolved, even inside an object that
/// is otherwise walked recursively.
pub const RESERVED_KEYS: &[&str] = &["credential_id", "operation"];

/// Everything the resolver needs to evaluate a `{{ ... }}` expression.
pub struct ResolutionContext<'a> {
    /// The current item — what `$json` refers to.
    pub json: &'a Value,
    /// Upstream node outputs, keyed by both node ID and display name —
    /// `$('Name').json` resolves by whichever the workflow used.
    pub node_outputs: &'a HashMap<String, Value>,
}

/// Resolve every `{{ ... }}` template found in `value`, recursing through
/// objects and arrays.
#[must_use]
pub fn resolve_value(value: &Value, ctx: &ResolutionContext<'_>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, ctx)).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                if RESERVED_KEYS.contains(&k.as_str()) {
                    out.insert(k.clone(), v.clone());
                } else {
                    out.insert(k.clone(), resolve_value(v, ctx));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Fast-path check used before doing any parsing work.
fn contains_expression(s: &str) -> bool {
    s.contains("{{")
}

/// Resolve a single string. If the *entire* trimmed string is one `{{ ... }}`
/// expression, the resolved JSON value is returned as-is (so numbers,
/// objects, and arrays survive intact rather than being stringified).
/// Otherwise every `{{ ... }}` span found is stringified and spliced back
/// into the surrounding text. A span that fails to resolve is left as the
/// original literal text (spec §4.2 — missing paths do not fail the node).
fn resolve_string(s: &str, ctx: &ResolutionContext<'_>) -> Value {
    if !contains_expression(s) {
        return Value::String(s.to_owned());
    }

    if let Some(inner) = whole_expression(s) {
        return evaluate_expression(inner, ctx).unwrap_or_else(|| Value::String(s.to_owned()));
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let Some(end) = rest[start..].find("}}") else {
            result.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let expr = &rest[start + 2..start + end];
        match evaluate_expression(expr.trim(), ctx) {
            Some(value) => result.push_str(&stringify(&value)),
            None => result.push_str(&rest[start..start + end + 2]),
        }
        rest = &rest[start + end + 2..];
    }
    result.push_str(rest);
    Value::String(result)
}

/// If `s`, trimmed, is exactly one `{{ ... }}` span, return its inner text.
fn whole_expression(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") {
        return None;
    }
    Some(inner.trim())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate one expression body (without the surrounding `{{ }}`), e.g.
/// `$json.symbol` or `$('Fetch Price').json.close[-1]`.
fn evaluate_expression(expr: &str, ctx: &ResolutionContext<'_>) -> Option<Value> {
    if let Some(rest) = expr.strip_prefix("$json") {
        let path = rest.strip_prefix('.').unwrap_or(rest);
        return if path.is_empty() {
            Some(ctx.json.clone())
        } else {
            get_path(ctx.json, &parse_path(path))
        };
    }

    if let Some(rest) = expr.strip_prefix("$('").or_else(|| expr.strip_prefix("$(\"")) {
        let quote_end = rest.find(['\'', '"'])?;
        let name = &rest[..quote_end];
        let rest = rest[quote_end + 1..].strip_prefix(')')?;
        let rest = rest.strip_prefix(".json")?;
        let path = rest.strip_prefix('.').unwrap_or(rest);

        let node_value = ctx.node_outputs.get(name)?;
        return if path.is_empty() {
            Some(node_value.clone())
        } else {
            get_path(node_value, &parse_path(path))
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(json: &'a Value, node_outputs: &'a HashMap<String, Value>) -> ResolutionContext<'a> {
        ResolutionContext { json, node_outputs }
    }

    #[test]
    fn plain_string_passes_through_unchanged() {
        let json = json!({});
        let outputs = HashMap::new();
        let resolved = resolve_value(&json!("hello"), &ctx(&json, &outputs));
        assert_eq!(resolved, json!("hello"));
    }

    #[test]
    fn whole_expression_preserves_type() {
        let json = json!({"count": 42});
        let outputs = HashMap::new();
        let resolved = resolve_value(&json!("{{ $json.count }}"), &ctx(&json, &outputs));
        assert_eq!(resolved, json!(42));
    }

    #[test]
    fn embedded_expression_is_stringified() {
        let json = json!({"symbol": "AAPL"});
        let outputs = HashMap::new();
        let resolved = resolve_value(&json!("Symbol: {{ $json.symbol }}!"), &ctx(&json, &outputs));
        assert_eq!(resolved, json!("Symbol: AAPL!"));
    }

    #[test]
    fn named_node_reference_resolves_through_outputs() {
        let current = json!({});
        let mut outputs = HashMap::new();
        outputs.insert("Fetch Price".to_string(), json!({"close": [100, 101, 99]}));
        let resolved = resolve_value(
            &json!("{{ $('Fetch Price').json.close[-1] }}"),
            &ctx(&current, &outputs),
        );
        assert_eq!(resolved, json!(99));
    }

    #[test]
    fn missing_path_leaves_literal_unresolved() {
        let json = json!({"a": 1});
        let outputs = HashMap::new();
        let resolved = resolve_value(&json!("{{ $json.missing.deep }}"), &ctx(&json, &outputs));
        assert_eq!(resolved, json!("{{ $json.missing.deep }}"));
    }

    #[test]
    fn reserved_keys_are_never_resolved() {
        let current = json!({"value": 10});
        let outputs = HashMap::new();
        let input = json!({
            "credential_id": "{{ $json.should_not_resolve }}",
            "operation": "{{ $json.also_not_resolved }}",
            "amount": "{{ $json.value }}",
        });
        let resolved = resolve_value(&input, &ctx(&current, &outputs));
        assert_eq!(resolved["credential_id"], json!("{{ $json.should_not_resolve }}"));
        assert_eq!(resolved["operation"], json!("{{ $json.also_not_resolved }}"));
        assert_eq!(resolved["amount"], json!(10));
    }

    #[test]
    fn recurses_into_arrays_and_nested_objects() {
        let current = json!({"x": 5});
        let outputs = HashMap::new();
        let input = json!({
            "nested": {"v": "{{ $json.x }}"},
            "list": ["{{ $json.x }}", "plain"],
        });
        let resolved = resolve_value(&input, &ctx(&current, &outputs));
        assert_eq!(resolved["nested"]["v"], json!(5));
        assert_eq!(resolved["list"][0], json!(5));
        assert_eq!(resolved["list"][1], json!("plain"));
    }
}
