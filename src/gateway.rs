//! Status projection and gated artifact download.
//!
//! Downloads are allowed only for `success` tasks, and only when the object
//! store agrees with the record: the object must exist at the recorded key
//! with the recorded size. Anything else is a storage inconsistency, which
//! is reported separately from "not ready".

use std::sync::Arc;

use crate::artifact::{ArtifactError, ArtifactStore, ByteStream};
use crate::error::TaskError;
use crate::store::TaskStore;
use crate::types::{TaskStatus, TaskView};

/// A download ready to be streamed to the client.
pub struct ArtifactDownload {
    /// Task the artifact belongs to.
    pub task_id: String,
    /// Display name for `Content-Disposition`.
    pub filename: String,
    /// Exact byte length of `body`.
    pub size: u64,
    /// Artifact contents.
    pub body: ByteStream,
}

impl std::fmt::Debug for ArtifactDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactDownload")
            .field("task_id", &self.task_id)
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Read side of the task lifecycle.
#[derive(Clone)]
pub struct TaskGateway {
    store: Arc<dyn TaskStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl std::fmt::Debug for TaskGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGateway")
            .field("bucket", &self.artifacts.bucket())
            .finish_non_exhaustive()
    }
}

impl TaskGateway {
    /// Creates a gateway over a task store and an object store.
    pub fn new(store: Arc<dyn TaskStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { store, artifacts }
    }

    /// Client-facing view of a task, or [`TaskError::NotFound`].
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn status(&self, task_id: &str) -> Result<TaskView, TaskError> {
        Ok(self.store.get(task_id).await?.to_view())
    }

    /// Opens the artifact of a successful task.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown id.
    /// - [`TaskError::NotReady`] unless the task is `success`.
    /// - [`TaskError::StorageInconsistency`] when the object is missing, the
    ///   recorded key is unusable, or the stored size differs.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn download(&self, task_id: &str) -> Result<ArtifactDownload, TaskError> {
        let record = self.store.get(task_id).await?;
        if record.status != TaskStatus::Success {
            return Err(TaskError::NotReady {
                task_id: task_id.to_string(),
                status: record.status,
            });
        }

        let inconsistency = |key: &str, reason: String| {
            tracing::warn!(key, reason = %reason, "artifact does not match task record");
            TaskError::StorageInconsistency {
                task_id: task_id.to_string(),
                key: key.to_string(),
                reason,
            }
        };

        let Some(result) = record.result else {
            return Err(inconsistency("", "success record has no result".to_string()));
        };
        let locator = result.artifact;

        let object = match self.artifacts.get(&locator.key).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                return Err(inconsistency(&locator.key, "object not found".to_string()));
            },
            Err(ArtifactError::InvalidKey { .. }) => {
                return Err(inconsistency(&locator.key, "recorded key is invalid".to_string()));
            },
            Err(e) => {
                tracing::error!(error = %e, "artifact store read failed");
                return Err(e.into());
            },
        };

        if object.size != locator.size {
            return Err(inconsistency(
                &locator.key,
                format!(
                    "stored object is {} bytes, record says {}",
                    object.size, locator.size
                ),
            ));
        }

        Ok(ArtifactDownload {
            task_id: task_id.to_string(),
            filename: locator.filename,
            size: locator.size,
            body: object.body,
        })
    }
}
