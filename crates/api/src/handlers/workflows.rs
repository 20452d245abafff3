use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use db::repository::workflows as wf_repo;
use engine::models::{Edge, NodeDefinition};

use super::AppState;

#[derive(serde::Deserialize)]
pub struct CreateWorkflowDto {
    pub user_id: Uuid,
    pub name: String,
    pub nodes: Value,
    pub edges: Value,
    #[serde(default)]
    pub schedule_cron: Option<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<db::models::WorkflowRow>>, StatusCode> {
    match wf_repo::list_workflows(&state.pool).await {
        Ok(workflows) => Ok(Json(workflows)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<db::models::WorkflowRow>, StatusCode> {
    match wf_repo::get_workflow(&state.pool, id).await {
        Ok(wf) => Ok(Json(wf)),
        Err(db::DbError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Derives the workflow's `schedule_cron` from its own `Scheduler` node
/// (spec §4.5) rather than trusting a free-text cron string from the
/// request body. A graph with no `Scheduler` node is never scheduled,
/// regardless of what the client sent; a graph with one must match it if
/// the client sent a value at all.
fn resolve_schedule_cron(nodes: &[NodeDefinition], requested: Option<&str>) -> Result<Option<String>, StatusCode> {
    match scheduler::derive_cron(nodes) {
        Ok(derived) => match requested {
            Some(req) if req != derived => Err(StatusCode::BAD_REQUEST),
            _ => Ok(Some(derived)),
        },
        Err(scheduler::SchedulerError::MissingSchedulerNode) => Ok(None),
        Err(_) => Err(StatusCode::BAD_REQUEST),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> Result<(StatusCode, Json<db::models::WorkflowRow>), StatusCode> {
    let nodes: Vec<NodeDefinition> = serde_json::from_value(payload.nodes.clone()).map_err(|_| StatusCode::BAD_REQUEST)?;
    let edges: Vec<Edge> = serde_json::from_value(payload.edges.clone()).map_err(|_| StatusCode::BAD_REQUEST)?;
    let candidate = engine::models::Workflow::new(payload.user_id, payload.name.clone(), nodes.clone(), edges);
    if engine::validate_dag(&candidate).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let schedule_cron = resolve_schedule_cron(&nodes, payload.schedule_cron.as_deref())?;

    match wf_repo::create_workflow(
        &state.pool,
        payload.user_id,
        &payload.name,
        payload.nodes,
        payload.edges,
        schedule_cron.as_deref(),
        payload.project_id,
    )
    .await
    {
        Ok(wf) => Ok((StatusCode::CREATED, Json(wf))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn delete(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match wf_repo::delete_workflow(&state.pool, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(db::DbError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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
    fn no_scheduler_node_ignores_any_requested_cron() {
        let nodes = vec![];
        assert_eq!(resolve_schedule_cron(&nodes, Some("0 0 * * *")), Ok(None));
        assert_eq!(resolve_schedule_cron(&nodes, None), Ok(None));
    }

    #[test]
    fn derives_cron_when_none_requested() {
        let nodes = vec![scheduler_node(json!({"interval": "hours", "count": 2, "minute": 15}))];
        assert_eq!(resolve_schedule_cron(&nodes, None), Ok(Some("15 */2 * * *".to_string())));
    }

    #[test]
    fn matching_requested_cron_is_accepted() {
        let nodes = vec![scheduler_node(json!({"interval": "hours", "count": 2, "minute": 15}))];
        assert_eq!(
            resolve_schedule_cron(&nodes, Some("15 */2 * * *")),
            Ok(Some("15 */2 * * *".to_string()))
        );
    }

    #[test]
    fn mismatched_requested_cron_is_rejected() {
        let nodes = vec![scheduler_node(json!({"interval": "hours", "count": 2, "minute": 15}))];
        assert_eq!(resolve_schedule_cron(&nodes, Some("0 0 * * *")), Err(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn multiple_scheduler_nodes_is_rejected() {
        let nodes = vec![
            scheduler_node(json!({"interval": "hours", "count": 1})),
            scheduler_node(json!({"interval": "hours", "count": 1})),
        ];
        assert_eq!(resolve_schedule_cron(&nodes, None), Err(StatusCode::BAD_REQUEST));
    }
}
