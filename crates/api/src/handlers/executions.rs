use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use db::repository::{executions as exec_repo, node_store, workflows as wf_repo};

use super::AppState;

#[derive(serde::Deserialize)]
pub struct ExecuteWorkflowDto {
    pub input: Value,
    #[serde(default)]
    pub initiated_by: Option<Uuid>,
}

/// Creates a `running` run row and enqueues a job for the `worker`
/// subcommand to pick up (spec §4.5 data flow: API/scheduler create the run,
/// a worker constructs and drives the engine).
pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<(StatusCode, Json<db::models::JobRow>), StatusCode> {
    let workflow = match wf_repo::get_workflow(&state.pool, id).await {
        Ok(w) => w,
        Err(db::DbError::NotFound) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let initiated_by = payload.initiated_by.or(Some(workflow.user_id));
    let run = match exec_repo::create_run(&state.pool, id, initiated_by).await {
        Ok(r) => r,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    match state.job_queue.enqueue(run.id, id, workflow.user_id, payload.input).await {
        Ok(job) => Ok((StatusCode::ACCEPTED, Json(job))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Serialize)]
pub struct NodeStateDto {
    pub state: Option<String>,
    pub output: Option<Value>,
}

/// Reads the node store sidecar (spec §4.6) for one node of a run — the
/// same latest-attempt row the engine mirrors into on every completion or
/// failure, exposed for crash-time diagnostics rather than run audit
/// history (see `node_execution_history` for the full attempt log).
pub async fn node_state(
    Path((run_id, node_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<Json<NodeStateDto>, StatusCode> {
    let node_state = node_store::get_node_state(&state.pool, run_id, &node_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let output = node_store::get_node_output(&state.pool, run_id, &node_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(NodeStateDto { state: node_state, output }))
}
