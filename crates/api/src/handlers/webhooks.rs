use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use db::repository::{executions as exec_repo, workflows as wf_repo};

use super::AppState;

/// Inbound trigger for workflows with a `webhook`-typed source node whose
/// `values.path` matches the request path. Separate from `db::repository::
/// webhooks`, which audits this platform's *outbound* notification webhooks
/// (spec §6.4) — an inbound trigger has no row of its own, it's read
/// straight off the workflow's node graph.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let workflows = match wf_repo::list_workflows(&state.pool).await {
        Ok(wfs) => wfs,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let matched = workflows.into_iter().filter(|w| w.is_active).find(|w| {
        let Ok(nodes) = serde_json::from_value::<Vec<serde_json::Value>>(w.nodes.clone()) else {
            return false;
        };
        nodes.iter().any(|n| {
            n.get("node_type").and_then(Value::as_str) == Some("webhook")
                && n.get("values").and_then(|v| v.get("path")).and_then(Value::as_str) == Some(path.as_str())
        })
    });

    let Some(workflow) = matched else {
        return Err(StatusCode::NOT_FOUND);
    };

    let run = match exec_repo::create_run(&state.pool, workflow.id, Some(workflow.user_id)).await {
        Ok(r) => r,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    match state.job_queue.enqueue(run.id, workflow.id, workflow.user_id, payload).await {
        Ok(_job) => Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"message": "webhook accepted", "run_id": run.id})))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
