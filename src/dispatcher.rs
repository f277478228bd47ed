//! Task creation: validate, spawn, persist.
//!
//! The record is written only after the provider has accepted the spawn,
//! so a rejected or timed-out dispatch leaves nothing behind. Nothing is
//! retried here; a client that sees a dispatch error may simply submit
//! again and get a new task id.

use std::sync::Arc;

use crate::dispatch::{ComputeProvider, DispatchConfig, SpawnRequest};
use crate::domain::{new_task_id, TaskRecord};
use crate::error::TaskError;
use crate::store::TaskStore;
use crate::types::{CreateTaskRequest, CreateTaskResponse};

/// Creates tasks by spawning compute and recording the result.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    provider: Arc<dyn ComputeProvider>,
    config: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new(
        store: Arc<dyn TaskStore>,
        provider: Arc<dyn ComputeProvider>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Dispatch settings in use.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Validates `request`, spawns compute for it, and persists a
    /// `processing` record.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Validation`] for a blank subject or out-of-range
    ///   options. The provider is not called.
    /// - [`TaskError::Dispatch`] when the provider rejects or fails the
    ///   spawn. No record is created.
    /// - Store errors from persisting the record.
    #[tracing::instrument(
        skip(self, request),
        fields(task_id = tracing::field::Empty, provider = %self.provider.name())
    )]
    pub async fn dispatch(
        &self,
        request: CreateTaskRequest,
    ) -> Result<CreateTaskResponse, TaskError> {
        request.validate()?;

        let CreateTaskRequest { subject, options } = request;
        let subject = subject.trim().to_string();

        let task_id = new_task_id();
        tracing::Span::current().record("task_id", tracing::field::display(&task_id));

        let spawn = SpawnRequest::for_task(&task_id, &subject, &options, &self.config)?;
        let handle = self.provider.spawn(&spawn).await.map_err(|e| {
            tracing::error!(error = %e, "compute spawn failed; no task recorded");
            TaskError::from(e)
        })?;

        let handle_id = handle.id.clone();
        let record = TaskRecord::new(task_id, subject, options, handle);
        let record = self.store.create(record).await.map_err(|e| {
            tracing::error!(
                error = %e,
                dispatch_id = %handle_id,
                "compute was spawned but the task record could not be stored"
            );
            e
        })?;

        tracing::info!(dispatch_id = %handle_id, "task dispatched");
        Ok(CreateTaskResponse::accepted(record.task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::memory::InMemoryComputeProvider;
    use crate::dispatch::DispatchError;
    use crate::store::memory::InMemoryTaskStore;
    use crate::types::TaskStatus;

    fn setup() -> (Dispatcher, Arc<InMemoryTaskStore>, Arc<InMemoryComputeProvider>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let provider = Arc::new(InMemoryComputeProvider::new());
        let dispatcher = Dispatcher::new(
            store.clone(),
            provider.clone(),
            DispatchConfig::new("http://localhost:3000", "bucket"),
        );
        (dispatcher, store, provider)
    }

    #[tokio::test]
    async fn dispatch_persists_processing_record() {
        let (dispatcher, store, provider) = setup();
        let response = dispatcher
            .dispatch(CreateTaskRequest::new("  X1  "))
            .await
            .unwrap();
        assert_eq!(response.status, TaskStatus::Processing);

        let record = store.get(&response.task_id).await.unwrap();
        assert_eq!(record.subject, "X1");
        assert_eq!(record.status, TaskStatus::Processing);
        assert_eq!(record.dispatch_handle.provider, "memory");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].task_id, response.task_id);
        assert_eq!(requests[0].env["SUBJECT"], "X1");
    }

    #[tokio::test]
    async fn blank_subject_never_reaches_provider() {
        let (dispatcher, store, provider) = setup();
        let err = dispatcher
            .dispatch(CreateTaskRequest::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation { .. }));
        assert!(provider.requests().is_empty());
        assert!(store.backend().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_record() {
        let (dispatcher, store, provider) = setup();
        provider.fail_with(DispatchError::Rejected {
            status: 503,
            body: "capacity".to_string(),
        });
        let err = dispatcher
            .dispatch(CreateTaskRequest::new("X1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::Dispatch(DispatchError::Rejected { status: 503, .. })
        ));
        assert!(store.backend().is_empty());
    }
}
