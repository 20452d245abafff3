//! Cron derivation helper (spec §4.5): turns a workflow's single `Scheduler`
//! node into a standard 5-field cron expression.

use engine::models::NodeDefinition;
use serde_json::Value;

use crate::error::SchedulerError;

/// Locates the workflow's single `Scheduler` node and derives its cron
/// expression from `values`.
///
/// # Errors
///
/// Returns [`SchedulerError::MissingSchedulerNode`] / `MultipleSchedulerNodes`
/// if the node count isn't exactly one, or `InvalidCronConfig` if `values`
/// doesn't describe a valid derivation.
pub fn derive_cron(nodes: &[NodeDefinition]) -> Result<String, SchedulerError> {
    let mut scheduler_nodes = nodes.iter().filter(|n| n.node_type == "Scheduler");
    let node = scheduler_nodes.next().ok_or(SchedulerError::MissingSchedulerNode)?;
    let extra = scheduler_nodes.count();
    if extra > 0 {
        return Err(SchedulerError::MultipleSchedulerNodes(1 + extra));
    }
    derive_cron_from_values(&node.values)
}

fn derive_cron_from_values(values: &Value) -> Result<String, SchedulerError> {
    let interval = values
        .get("interval")
        .or_else(|| values.get("mode"))
        .and_then(Value::as_str)
        .ok_or_else(|| SchedulerError::InvalidCronConfig("missing 'interval'/'mode'".into()))?;

    if interval == "cron" {
        return values
            .get("cron")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SchedulerError::InvalidCronConfig("'cron' mode requires 'values.cron'".into()));
    }

    let count = values.get("count").and_then(Value::as_u64).unwrap_or(1).max(1);
    let hour = values.get("hour").and_then(Value::as_u64).unwrap_or(0);
    let minute = values.get("minute").and_then(Value::as_u64).unwrap_or(0);
    let dom = values.get("dom").and_then(Value::as_u64).unwrap_or(1);

    match interval {
        "minutes" => Ok(format!("*/{count} * * * *")),
        "hours" => Ok(format!("{minute} */{count} * * *")),
        "days" | "daily" => Ok(format!("{minute} {hour} */{count} * *")),
        "weeks" | "weekly" => {
            if count != 1 {
                return Err(SchedulerError::InvalidCronConfig(
                    "cron has no every-N-weeks; 'weeks' requires count=1".into(),
                ));
            }
            let dow = values
                .get("dow")
                .and_then(Value::as_array)
                .map(|days| {
                    days.iter()
                        .filter_map(Value::as_u64)
                        .map(|d| d.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "0".to_string());
            Ok(format!("{minute} {hour} * * {dow}"))
        }
        "months" | "monthly" => Ok(format!("{minute} {hour} {dom} */{count} *")),
        other => Err(SchedulerError::InvalidCronConfig(format!("unknown interval '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::models::NodeDefinition;

    fn scheduler_node(values: Value) -> NodeDefinition {
        NodeDefinition {
            id: "sched".into(),
            node_type: "Scheduler".into(),
            category: None,
            position: None,
            values,
            data: Value::Null,
        }
    }

    #[test]
    fn days_interval_matches_scenario_s5() {
        let nodes = vec![scheduler_node(serde_json::json!({
            "interval": "days",
            "count": 1,
            "hour": 9,
            "minute": 30,
        }))];
        assert_eq!(derive_cron(&nodes).unwrap(), "30 9 */1 * *");
    }

    #[test]
    fn weeks_interval_requires_count_one() {
        let nodes = vec![scheduler_node(serde_json::json!({
            "interval": "weeks",
            "count": 2,
        }))];
        assert!(derive_cron(&nodes).is_err());
    }

    #[test]
    fn minutes_interval() {
        let nodes = vec![scheduler_node(serde_json::json!({ "interval": "minutes", "count": 15 }))];
        assert_eq!(derive_cron(&nodes).unwrap(), "*/15 * * * *");
    }

    #[test]
    fn months_interval() {
        let nodes = vec![scheduler_node(serde_json::json!({
            "interval": "months",
            "count": 3,
            "hour": 6,
            "minute": 0,
            "dom": 1,
        }))];
        assert_eq!(derive_cron(&nodes).unwrap(), "0 6 1 */3 *");
    }

    #[test]
    fn cron_mode_passes_through_verbatim() {
        let nodes = vec![scheduler_node(serde_json::json!({
            "interval": "cron",
            "cron": "*/5 * * * *",
        }))];
        assert_eq!(derive_cron(&nodes).unwrap(), "*/5 * * * *");
    }

    #[test]
    fn missing_scheduler_node_is_an_error() {
        let nodes = vec![NodeDefinition {
            id: "a".into(),
            node_type: "Transform".into(),
            category: None,
            position: None,
            values: Value::Null,
            data: Value::Null,
        }];
        assert!(matches!(derive_cron(&nodes), Err(SchedulerError::MissingSchedulerNode)));
    }

    #[test]
    fn multiple_scheduler_nodes_is_an_error() {
        let nodes = vec![
            scheduler_node(serde_json::json!({ "interval": "minutes", "count": 1 })),
            scheduler_node(serde_json::json!({ "interval": "minutes", "count": 1 })),
        ];
        assert!(matches!(derive_cron(&nodes), Err(SchedulerError::MultipleSchedulerNodes(2))));
    }
}
