//! Route handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::TaskError;
use crate::service::TaskService;
use crate::types::{CallbackAck, CallbackRequest, CreateTaskRequest, CreateTaskResponse, TaskView};

/// `POST /tasks`
pub async fn create_task(
    State(service): State<Arc<TaskService>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), TaskError> {
    let Json(request) = payload?;
    let response = service.dispatcher().dispatch(request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// `GET /tasks/{task_id}`
pub async fn get_task(
    State(service): State<Arc<TaskService>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, TaskError> {
    Ok(Json(service.gateway().status(&task_id).await?))
}

/// `POST /tasks/{task_id}/callback`
pub async fn task_callback(
    State(service): State<Arc<TaskService>>,
    Path(task_id): Path<String>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<Json<CallbackAck>, TaskError> {
    let Json(request) = payload?;
    Ok(Json(service.ingestor().ingest(&task_id, request).await?))
}

/// `GET /tasks/{task_id}/download`
pub async fn download_task(
    State(service): State<Arc<TaskService>>,
    Path(task_id): Path<String>,
) -> Result<Response, TaskError> {
    let download = service.gateway().download(&task_id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&download.filename)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| TaskError::Store(format!("invalid content-disposition: {e}")))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(download.size)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Keeps a filename safe inside a quoted header parameter.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_sanitizing() {
        assert_eq!(sanitize_filename("out.bin"), "out.bin");
        assert_eq!(sanitize_filename("my report.pdf"), "my report.pdf");
        assert_eq!(sanitize_filename("a\"b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("line\nbreak"), "line_break");
        assert_eq!(sanitize_filename("résumé"), "r_sum_");
        assert_eq!(sanitize_filename("   "), "artifact");
    }
}
