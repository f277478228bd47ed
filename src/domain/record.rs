//! Task record -- the store's representation of a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::DispatchHandle;
use crate::domain::outcome::{CompletionOutcome, TaskResult};
use crate::error::TaskError;
use crate::types::params::TaskOptions;
use crate::types::task::{TaskStatus, TaskView};

/// Generates a fresh task identifier (hyphenated `UUIDv4`).
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Stored representation of a task.
///
/// Created once by the dispatcher in `Processing`, completed at most once
/// by the callback ingestor, read any number of times by the gateway.
///
/// `result` is present iff the status is `Success`, and `error_message`
/// iff it is `Error`. [`TaskRecord::complete`] is the only way to build a
/// terminal record, so the pairing holds for anything the store writes.
///
/// # Examples
///
/// ```
/// use artifact_tasks::dispatch::DispatchHandle;
/// use artifact_tasks::{TaskOptions, TaskRecord, TaskStatus};
///
/// let record = TaskRecord::new(
///     "t-1".to_string(),
///     "X1".to_string(),
///     TaskOptions::default(),
///     DispatchHandle::new("memory", "spawn-1"),
/// );
/// assert_eq!(record.status, TaskStatus::Processing);
/// assert!(record.completed_at.is_none());
/// assert!(record.result.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Primary key.
    pub task_id: String,

    /// Lifecycle status.
    pub status: TaskStatus,

    /// Subject identifier, trimmed.
    pub subject: String,

    /// Effective options.
    pub options: TaskOptions,

    /// Provider-side handle of the spawned compute.
    pub dispatch_handle: DispatchHandle,

    /// Artifact and metrics, set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    /// Failure reason, set on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Time the task left `Processing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Backend version, populated on read. Zero before the first write.
    #[serde(skip)]
    pub version: u64,
}

impl TaskRecord {
    /// Creates a record in `Processing` stamped with the current time.
    pub fn new(
        task_id: String,
        subject: String,
        options: TaskOptions,
        dispatch_handle: DispatchHandle,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Processing,
            subject,
            options,
            dispatch_handle,
            result: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
            version: 0,
        }
    }

    /// Returns `true` once the task is `Success` or `Error`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Builds the terminal record for `outcome`, completed at `at`.
    ///
    /// Fails with [`TaskError::DuplicateCallback`] if this record is
    /// already terminal. The receiver is left untouched.
    pub fn complete(
        &self,
        outcome: CompletionOutcome,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, TaskError> {
        let next = outcome.status();
        self.status.validate_transition(&self.task_id, &next)?;

        let mut record = self.clone();
        record.status = next;
        record.completed_at = Some(at);
        match outcome {
            CompletionOutcome::Success(result) => {
                record.result = Some(result);
                record.error_message = None;
            },
            CompletionOutcome::Error { message } => {
                record.result = None;
                record.error_message = Some(message);
            },
        }
        Ok(record)
    }

    /// Client-facing projection. Omits the dispatch handle.
    pub fn to_view(&self) -> TaskView {
        TaskView {
            task_id: self.task_id.clone(),
            status: self.status,
            subject: self.subject.clone(),
            options: self.options.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            result: self.result.clone(),
            error: self.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::outcome::ArtifactLocator;

    fn processing() -> TaskRecord {
        TaskRecord::new(
            new_task_id(),
            "X1".to_string(),
            TaskOptions::default(),
            DispatchHandle::new("memory", "spawn-1"),
        )
    }

    fn success_outcome() -> CompletionOutcome {
        CompletionOutcome::Success(TaskResult {
            artifact: ArtifactLocator {
                key: "artifacts/X1/out.bin".to_string(),
                filename: "out.bin".to_string(),
                size: 1024,
            },
            metrics: BTreeMap::new(),
        })
    }

    #[test]
    fn task_ids_are_uuid_v4() {
        let id = new_task_id();
        assert_eq!(id.len(), 36);
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn complete_success_sets_result_only() {
        let record = processing();
        let now = Utc::now();
        let done = record.complete(success_outcome(), now).unwrap();
        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(done.completed_at, Some(now));
        assert!(done.result.is_some());
        assert!(done.error_message.is_none());
        assert_eq!(record.status, TaskStatus::Processing);
    }

    #[test]
    fn complete_error_sets_message_only() {
        let done = processing()
            .complete(
                CompletionOutcome::Error {
                    message: "upstream 404".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(done.status, TaskStatus::Error);
        assert_eq!(done.error_message.as_deref(), Some("upstream 404"));
        assert!(done.result.is_none());
    }

    #[test]
    fn complete_twice_is_duplicate() {
        let done = processing()
            .complete(success_outcome(), Utc::now())
            .unwrap();
        let err = done
            .complete(
                CompletionOutcome::Error {
                    message: "late".to_string(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::DuplicateCallback {
                status: TaskStatus::Success,
                ..
            }
        ));
    }

    #[test]
    fn version_is_not_serialized() {
        let mut record = processing();
        record.version = 7;
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["status"], "processing");

        let back: TaskRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.version, 0);
        assert_eq!(back.task_id, record.task_id);
    }

    #[test]
    fn view_hides_dispatch_handle() {
        let json = serde_json::to_value(processing().to_view()).unwrap();
        assert!(json.get("dispatchHandle").is_none());
        assert_eq!(json["subject"], "X1");
    }
}
