//! HTTP surface.
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /tasks` | [`handlers::create_task`] |
//! | `GET /tasks/{task_id}` | [`handlers::get_task`] |
//! | `POST /tasks/{task_id}/callback` | [`handlers::task_callback`] |
//! | `GET /tasks/{task_id}/download` | [`handlers::download_task`] |
//! | `GET /health` | [`handlers::health`] |
//!
//! Errors become `{"error": kind, "message": ...}` bodies with the status
//! from [`TaskError::status_code`](crate::TaskError::status_code).

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::service::TaskService;

/// Builds the router over `service`.
pub fn router(service: Arc<TaskService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", post(handlers::create_task))
        .route("/tasks/{task_id}", get(handlers::get_task))
        .route("/tasks/{task_id}/callback", post(handlers::task_callback))
        .route("/tasks/{task_id}/download", get(handlers::download_task))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
