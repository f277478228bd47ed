//! Core task wire types: [`TaskStatus`], [`TaskView`], and
//! [`CreateTaskResponse`].
//!
//! # Serialization
//!
//! Structs use `#[serde(rename_all = "camelCase")]`; the status enum
//! serializes as lowercase strings (`"processing"`, `"success"`, `"error"`).
//! Optional fields are omitted when `None`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TaskResult;
use crate::error::TaskError;
use crate::types::params::TaskOptions;

/// Task lifecycle status.
///
/// A task starts in `Processing` and moves exactly once to one of the two
/// terminal states. Terminal states reject all transitions, and so do
/// self-transitions.
///
/// # State Machine
///
/// ```text
/// Processing -> Success, Error
/// Success -> (terminal, no transitions)
/// Error -> (terminal, no transitions)
/// ```
///
/// # Examples
///
/// ```
/// use artifact_tasks::TaskStatus;
///
/// let status = TaskStatus::Processing;
/// assert!(!status.is_terminal());
/// assert!(status.can_transition_to(&TaskStatus::Success));
/// assert!(!TaskStatus::Success.can_transition_to(&TaskStatus::Error));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Dispatched; waiting for the completion callback.
    Processing,
    /// Completed with an artifact (terminal).
    Success,
    /// Completed with an error message (terminal).
    Error,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl TaskStatus {
    /// Returns `true` if this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Returns `true` if transitioning from this status to `next` is valid.
    ///
    /// Only `Processing -> Success` and `Processing -> Error` are valid.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Success) | (Self::Processing, Self::Error)
        )
    }

    /// Validates a transition from this status to `next`.
    ///
    /// A transition out of a terminal state is reported as
    /// [`TaskError::DuplicateCallback`], since the only writer after
    /// creation is the completion callback. Any other rejected transition
    /// (for example back to `Processing`) is a [`TaskError::Validation`].
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_tasks::{TaskError, TaskStatus};
    ///
    /// assert!(TaskStatus::Processing
    ///     .validate_transition("task-1", &TaskStatus::Success)
    ///     .is_ok());
    ///
    /// let err = TaskStatus::Success
    ///     .validate_transition("task-1", &TaskStatus::Error)
    ///     .unwrap_err();
    /// assert!(matches!(err, TaskError::DuplicateCallback { .. }));
    /// ```
    pub fn validate_transition(&self, task_id: &str, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        if self.is_terminal() {
            return Err(TaskError::DuplicateCallback {
                task_id: task_id.to_string(),
                status: *self,
            });
        }
        Err(TaskError::validation(format!(
            "task {task_id} cannot move from {self} to {next}"
        )))
    }
}

/// Read-only projection of a task returned by `GET /tasks/{task_id}`.
///
/// Contains everything a client may see about a task. The dispatch handle
/// is not included.
///
/// # Examples
///
/// ```
/// use artifact_tasks::{TaskOptions, TaskStatus, TaskView};
///
/// let view = TaskView {
///     task_id: "abc-123".to_string(),
///     status: TaskStatus::Processing,
///     subject: "X1".to_string(),
///     options: TaskOptions::default(),
///     created_at: chrono::Utc::now(),
///     completed_at: None,
///     result: None,
///     error: None,
/// };
///
/// let json = serde_json::to_value(&view).unwrap();
/// assert_eq!(json["taskId"], "abc-123");
/// assert_eq!(json["status"], "processing");
/// assert!(json.get("completedAt").is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    /// Unique identifier for this task.
    pub task_id: String,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Subject identifier from the creation request.
    pub subject: String,

    /// Effective options (defaults applied).
    pub options: TaskOptions,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task left `processing`. Omitted while processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Artifact locator and metrics, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    /// Error message, present only on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskResponse {
    /// The new task's ID.
    pub task_id: String,

    /// Always `processing` for a freshly created task.
    pub status: TaskStatus,

    /// Human-readable confirmation.
    pub message: String,
}

impl CreateTaskResponse {
    /// Builds the response for a task that was just dispatched.
    pub fn accepted(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Processing,
            message: "task dispatched; poll the status endpoint for completion".to_string(),
        }
    }
}
