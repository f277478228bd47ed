//! Completion callback ingestion.
//!
//! The external compute reports its outcome once, but the network may
//! deliver it more than once. The first valid callback moves the task to a
//! terminal state; every later one is acknowledged as a duplicate and
//! changes nothing.

use std::sync::Arc;

use crate::error::TaskError;
use crate::store::TaskStore;
use crate::types::{CallbackAck, CallbackRequest};

/// Validates completion callbacks and applies them to the store.
#[derive(Clone)]
pub struct CallbackIngestor {
    store: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for CallbackIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackIngestor").finish_non_exhaustive()
    }
}

impl CallbackIngestor {
    /// Creates an ingestor over `store`.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Applies the callback for `task_id`.
    ///
    /// Returns an applied ack for the first valid callback and a duplicate
    /// ack (same terminal status, `duplicate: true`) for any later one.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Validation`] for a body that does not match the path
    ///   id or lacks the fields its status requires.
    /// - [`TaskError::NotFound`] for an unknown id.
    /// - [`TaskError::ConcurrentModification`] and store errors.
    #[tracing::instrument(skip(self, request), fields(task_id = %task_id, status = ?request.status))]
    pub async fn ingest(
        &self,
        task_id: &str,
        request: CallbackRequest,
    ) -> Result<CallbackAck, TaskError> {
        let outcome = request.into_outcome(task_id)?;

        match self.store.apply_completion(task_id, outcome).await {
            Ok(record) => {
                tracing::info!(status = %record.status, "task completed");
                Ok(CallbackAck::applied(record.status))
            },
            Err(TaskError::DuplicateCallback { status, .. }) => {
                tracing::warn!(
                    current = %status,
                    "duplicate callback for terminal task; not applied"
                );
                Ok(CallbackAck::duplicate(status))
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchHandle;
    use crate::domain::{new_task_id, TaskRecord};
    use crate::store::memory::InMemoryTaskStore;
    use crate::types::{TaskOptions, TaskStatus};

    async fn setup() -> (CallbackIngestor, Arc<dyn TaskStore>, String) {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let record = store
            .create(TaskRecord::new(
                new_task_id(),
                "X1".to_string(),
                TaskOptions::default(),
                DispatchHandle::new("memory", "1"),
            ))
            .await
            .unwrap();
        (CallbackIngestor::new(store.clone()), store, record.task_id)
    }

    #[tokio::test]
    async fn first_callback_is_applied() {
        let (ingestor, store, id) = setup().await;
        let ack = ingestor
            .ingest(&id, CallbackRequest::success(&id, format!("artifacts/{id}/out.bin"), 1024))
            .await
            .unwrap();
        assert_eq!(ack, CallbackAck::applied(TaskStatus::Success));
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn conflicting_late_callback_is_duplicate() {
        let (ingestor, store, id) = setup().await;
        ingestor
            .ingest(&id, CallbackRequest::failure(&id, "upstream 404"))
            .await
            .unwrap();
        let before = store.get(&id).await.unwrap();

        let ack = ingestor
            .ingest(&id, CallbackRequest::success(&id, "artifacts/x/out.bin", 1))
            .await
            .unwrap();
        assert_eq!(ack, CallbackAck::duplicate(TaskStatus::Error));

        let after = store.get(&id).await.unwrap();
        assert_eq!(after.status, TaskStatus::Error);
        assert_eq!(after.completed_at, before.completed_at);
        assert!(after.result.is_none());
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let (ingestor, _, _) = setup().await;
        let err = ingestor
            .ingest("nope", CallbackRequest::failure("nope", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_body_is_rejected_before_store() {
        let (ingestor, store, id) = setup().await;
        let err = ingestor
            .ingest(&id, CallbackRequest::failure("other-id", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation { .. }));
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn oversized_error_callback_still_completes_task() {
        let (ingestor, store, id) = setup().await;
        let limit = store.config().max_error_message_bytes;
        let message = "e".repeat(limit + 904);

        let ack = ingestor
            .ingest(&id, CallbackRequest::failure(&id, message.clone()))
            .await
            .unwrap();
        assert_eq!(ack, CallbackAck::applied(TaskStatus::Error));

        // A retry of the same body is a duplicate, not another failure.
        let ack = ingestor
            .ingest(&id, CallbackRequest::failure(&id, message))
            .await
            .unwrap();
        assert_eq!(ack, CallbackAck::duplicate(TaskStatus::Error));

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert_eq!(record.error_message.map(|m| m.len()), Some(limit));
    }
}
