//! Error types for task operations.
//!
//! Provides [`TaskError`], a rich error enum with context fields and an
//! HTTP status mapping used at the transport boundary.

use http::StatusCode;

use crate::artifact::ArtifactError;
use crate::dispatch::DispatchError;
use crate::types::task::TaskStatus;

/// Errors that can occur during task operations.
///
/// Each variant carries contextual information (task ID, status, etc.) to
/// aid debugging. Use [`status_code`](TaskError::status_code) and
/// [`kind`](TaskError::kind) to build wire responses.
///
/// # Examples
///
/// ```
/// use artifact_tasks::{TaskError, TaskStatus};
///
/// let err = TaskError::NotReady {
///     task_id: "t-1".to_string(),
///     status: TaskStatus::Error,
/// };
/// assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
/// assert!(err.to_string().contains("error"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Missing or malformed request fields. No record was created or changed.
    #[error("invalid request: {message}")]
    Validation {
        /// What was wrong with the request.
        message: String,
    },

    /// The compute provider rejected or failed the spawn call.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Task with the given ID was not found.
    #[error("task not found: {task_id}")]
    NotFound {
        /// The task ID that was not found.
        task_id: String,
    },

    /// A record with this ID was already created.
    #[error("task already exists: {task_id}")]
    AlreadyExists {
        /// The conflicting task ID.
        task_id: String,
    },

    /// A completion signal arrived for a task that is already terminal.
    #[error("duplicate callback for task {task_id} (already {status})")]
    DuplicateCallback {
        /// The task ID.
        task_id: String,
        /// The terminal status the task already holds.
        status: TaskStatus,
    },

    /// Download requested before the task succeeded.
    #[error("task not ready: {task_id} (status: {status})")]
    NotReady {
        /// The task ID.
        task_id: String,
        /// The task's current status.
        status: TaskStatus,
    },

    /// The record says `success` but the artifact it points at is absent
    /// or does not match the recorded size.
    #[error("storage inconsistency for task {task_id} at {key}: {reason}")]
    StorageInconsistency {
        /// The task ID.
        task_id: String,
        /// The artifact key recorded on the task.
        key: String,
        /// What did not match.
        reason: String,
    },

    /// A compare-and-set write lost to a concurrent writer and the record
    /// was not left in a terminal state.
    #[error(
        "concurrent modification of task {task_id}: expected version {expected_version}, found {actual_version}"
    )]
    ConcurrentModification {
        /// The task ID.
        task_id: String,
        /// The version the writer read.
        expected_version: u64,
        /// The version found at write time.
        actual_version: u64,
    },

    /// Object store failure.
    #[error("artifact store error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Backend storage error.
    #[error("store error: {0}")]
    Store(String),
}

impl TaskError {
    /// Shorthand for [`TaskError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Stable, snake_case name of the error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Dispatch(_) => "dispatch_error",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::DuplicateCallback { .. } => "duplicate_callback",
            Self::NotReady { .. } => "not_ready",
            Self::StorageInconsistency { .. } => "storage_inconsistency",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Artifact(_) => "artifact_error",
            Self::Store(_) => "store_error",
        }
    }

    /// Maps this error to an HTTP status code.
    ///
    /// - `400`: `Validation`, `NotReady`
    /// - `404`: `NotFound`, `StorageInconsistency`
    /// - `409`: `AlreadyExists`, `ConcurrentModification`
    /// - `200`: `DuplicateCallback` (acknowledged, not a caller error)
    /// - `502`: `Dispatch`
    /// - `500`: `Artifact`, `Store`
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::NotReady { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::StorageInconsistency { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::ConcurrentModification { .. } => {
                StatusCode::CONFLICT
            },
            Self::DuplicateCallback { .. } => StatusCode::OK,
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Artifact(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TaskError::NotFound {
            task_id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "task not found: abc");

        let err = TaskError::NotReady {
            task_id: "def".to_string(),
            status: TaskStatus::Processing,
        };
        assert_eq!(err.to_string(), "task not ready: def (status: processing)");

        let err = TaskError::DuplicateCallback {
            task_id: "ghi".to_string(),
            status: TaskStatus::Success,
        };
        assert!(err.to_string().contains("already success"));
    }

    #[test]
    fn dispatch_error_converts() {
        let err: TaskError = DispatchError::Timeout.into();
        assert_eq!(err.kind(), "dispatch_error");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            TaskError::validation("subject is required").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TaskError::StorageInconsistency {
                task_id: "t".to_string(),
                key: "k".to_string(),
                reason: "missing".to_string(),
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TaskError::AlreadyExists {
                task_id: "t".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            TaskError::Store("fail".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_ready_and_inconsistency_are_distinct_kinds() {
        let not_ready = TaskError::NotReady {
            task_id: "t".to_string(),
            status: TaskStatus::Error,
        };
        let missing = TaskError::StorageInconsistency {
            task_id: "t".to_string(),
            key: "artifacts/t/out.bin".to_string(),
            reason: "object not found".to_string(),
        };
        assert_ne!(not_ready.kind(), missing.kind());
        assert_ne!(not_ready.status_code(), missing.status_code());
    }
}
