//! Request and response bodies for the task endpoints.
//!
//! Request types validate themselves; the dispatcher and the callback
//! ingestor call `validate` / `into_outcome` before touching the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DEPTH, DEFAULT_PARALLEL_BATCH_SIZE, MAX_MAX_DEPTH, MAX_PARALLEL_BATCH_SIZE,
};
use crate::domain::{ArtifactLocator, CompletionOutcome, TaskResult};
use crate::error::TaskError;
use crate::types::task::TaskStatus;

/// Body of `POST /tasks`.
///
/// # Examples
///
/// ```
/// use artifact_tasks::CreateTaskRequest;
///
/// let req: CreateTaskRequest = serde_json::from_str(r#"{"subject": "X1"}"#).unwrap();
/// assert_eq!(req.subject, "X1");
/// assert_eq!(req.options.max_depth, 10);
/// assert!(req.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Identifier of the thing the compute should work on.
    pub subject: String,

    /// Processing options; omitted keys take their defaults.
    #[serde(default)]
    pub options: TaskOptions,
}

impl CreateTaskRequest {
    /// Builds a request with default options.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            options: TaskOptions::default(),
        }
    }

    /// Checks the subject and the options bounds.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.subject.trim().is_empty() {
            return Err(TaskError::validation("subject must not be empty"));
        }
        self.options.validate()
    }
}

/// Options forwarded to the spawned compute.
///
/// Unknown keys are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskOptions {
    /// Include dependent sub-items.
    pub recursive: bool,

    /// Recursion depth ceiling, `1..=100`.
    pub max_depth: u32,

    /// Include optional derived content.
    pub include_ocr: bool,

    /// Restrict derived content to these kinds. Empty means no restriction.
    pub content_filters: Vec<String>,

    /// Parallelism hint for the downstream compute, `1..=100`.
    pub parallel_batch_size: u32,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: DEFAULT_MAX_DEPTH,
            include_ocr: false,
            content_filters: Vec::new(),
            parallel_batch_size: DEFAULT_PARALLEL_BATCH_SIZE,
        }
    }
}

impl TaskOptions {
    /// Validates numeric bounds and filter entries.
    pub fn validate(&self) -> Result<(), TaskError> {
        if !(1..=MAX_MAX_DEPTH).contains(&self.max_depth) {
            return Err(TaskError::validation(format!(
                "maxDepth must be between 1 and {MAX_MAX_DEPTH}, got {}",
                self.max_depth
            )));
        }
        if !(1..=MAX_PARALLEL_BATCH_SIZE).contains(&self.parallel_batch_size) {
            return Err(TaskError::validation(format!(
                "parallelBatchSize must be between 1 and {MAX_PARALLEL_BATCH_SIZE}, got {}",
                self.parallel_batch_size
            )));
        }
        if self.content_filters.iter().any(|f| f.trim().is_empty()) {
            return Err(TaskError::validation(
                "contentFilters entries must not be empty",
            ));
        }
        Ok(())
    }
}

/// Outcome reported by the external compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    /// The artifact was produced.
    Success,
    /// The work failed.
    Error,
}

/// Body of `POST /tasks/{task_id}/callback`.
///
/// # Examples
///
/// ```
/// use artifact_tasks::{CallbackRequest, CallbackStatus};
///
/// let body = r#"{
///     "taskId": "t-1",
///     "status": "success",
///     "result": {"artifactKey": "artifacts/t-1/out.bin", "size": 1024}
/// }"#;
/// let req: CallbackRequest = serde_json::from_str(body).unwrap();
/// assert_eq!(req.status, CallbackStatus::Success);
///
/// let outcome = req.into_outcome("t-1").unwrap();
/// assert_eq!(outcome.status().to_string(), "success");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    /// Must match the task id in the path.
    pub task_id: String,

    /// Reported outcome.
    pub status: CallbackStatus,

    /// Artifact details; required when `status` is `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CallbackResult>,

    /// Failure message; required when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Artifact details carried by a success callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResult {
    /// Object store key the artifact was written to.
    pub artifact_key: String,

    /// Display name for downloads. Defaults to the last key segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Artifact size in bytes.
    pub size: u64,

    /// Free-form numeric counters.
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Number>,
}

impl CallbackRequest {
    /// Builds a success callback body.
    pub fn success(task_id: impl Into<String>, artifact_key: impl Into<String>, size: u64) -> Self {
        Self {
            task_id: task_id.into(),
            status: CallbackStatus::Success,
            result: Some(CallbackResult {
                artifact_key: artifact_key.into(),
                filename: None,
                size,
                metrics: BTreeMap::new(),
            }),
            error: None,
        }
    }

    /// Builds an error callback body.
    pub fn failure(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: CallbackStatus::Error,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Validates the body against the path id and converts it into a
    /// [`CompletionOutcome`].
    pub fn into_outcome(self, path_task_id: &str) -> Result<CompletionOutcome, TaskError> {
        if self.task_id != path_task_id {
            return Err(TaskError::validation(format!(
                "body taskId {} does not match path task id {path_task_id}",
                self.task_id
            )));
        }

        match self.status {
            CallbackStatus::Success => {
                let result = self.result.ok_or_else(|| {
                    TaskError::validation("success callback requires a result")
                })?;
                let key = result.artifact_key.trim();
                if key.is_empty() {
                    return Err(TaskError::validation("result.artifactKey must not be empty"));
                }
                let filename = match result.filename {
                    Some(name) => name,
                    None => key.rsplit('/').next().unwrap_or_default().to_string(),
                };
                if filename.trim().is_empty() {
                    return Err(TaskError::validation("result.filename must not be empty"));
                }
                Ok(CompletionOutcome::Success(TaskResult {
                    artifact: ArtifactLocator {
                        key: key.to_string(),
                        filename,
                        size: result.size,
                    },
                    metrics: result.metrics,
                }))
            },
            CallbackStatus::Error => {
                let message = self.error.unwrap_or_default();
                if message.trim().is_empty() {
                    return Err(TaskError::validation(
                        "error callback requires a non-empty error message",
                    ));
                }
                Ok(CompletionOutcome::Error { message })
            },
        }
    }
}

/// Acknowledgment returned for every accepted callback, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAck {
    /// Always `true`.
    pub received: bool,

    /// `true` when the task was already terminal and nothing was applied.
    pub duplicate: bool,

    /// The task's terminal status after this callback.
    pub status: TaskStatus,
}

impl CallbackAck {
    /// Ack for a callback that moved the task to `status`.
    pub fn applied(status: TaskStatus) -> Self {
        Self {
            received: true,
            duplicate: false,
            status,
        }
    }

    /// Ack for a callback that arrived after the task was already `status`.
    pub fn duplicate(status: TaskStatus) -> Self {
        Self {
            received: true,
            duplicate: true,
            status,
        }
    }
}
