//! `api` crate — HTTP REST API layer (spec §1 names this surface an external
//! collaborator; this repo carries a thin one so workflows can be created,
//! inspected, and run over HTTP instead of only through `cli`).
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/execute
//!   POST   /webhook/:path

pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use db::DbPool;
use queue::JobQueue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub job_queue: JobQueue,
}

pub async fn serve(bind: &str, pool: DbPool) -> Result<(), std::io::Error> {
    let job_queue = JobQueue::new(pool.clone());
    let state = AppState { pool, job_queue };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:id", get(handlers::workflows::get).delete(handlers::workflows::delete))
        .route("/workflows/:id/execute", post(handlers::executions::execute))
        .route("/runs/:run_id/nodes/:node_id", get(handlers::executions::node_state));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
