//! Wiring of the three lifecycle components over shared stores.

use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::callback::CallbackIngestor;
use crate::dispatch::{ComputeProvider, DispatchConfig};
use crate::dispatcher::Dispatcher;
use crate::gateway::TaskGateway;
use crate::store::TaskStore;

/// Dispatcher, callback ingestor and gateway sharing one task store.
///
/// This is the state the HTTP router runs on.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use artifact_tasks::artifact::memory::InMemoryArtifactStore;
/// use artifact_tasks::dispatch::memory::InMemoryComputeProvider;
/// use artifact_tasks::dispatch::DispatchConfig;
/// use artifact_tasks::{InMemoryTaskStore, TaskService};
///
/// let service = TaskService::new(
///     Arc::new(InMemoryTaskStore::new()),
///     Arc::new(InMemoryComputeProvider::new()),
///     Arc::new(InMemoryArtifactStore::new("bucket")),
///     DispatchConfig::new("http://localhost:3000", "bucket"),
/// );
/// assert_eq!(service.dispatcher().config().artifact_bucket, "bucket");
/// ```
#[derive(Debug, Clone)]
pub struct TaskService {
    dispatcher: Dispatcher,
    ingestor: CallbackIngestor,
    gateway: TaskGateway,
}

impl TaskService {
    /// Builds all three components over `store`.
    pub fn new(
        store: Arc<dyn TaskStore>,
        provider: Arc<dyn ComputeProvider>,
        artifacts: Arc<dyn ArtifactStore>,
        dispatch_config: DispatchConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(store.clone(), provider, dispatch_config),
            ingestor: CallbackIngestor::new(store.clone()),
            gateway: TaskGateway::new(store, artifacts),
        }
    }

    /// Task creation.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Callback ingestion.
    pub fn ingestor(&self) -> &CallbackIngestor {
        &self.ingestor
    }

    /// Status and download.
    pub fn gateway(&self) -> &TaskGateway {
        &self.gateway
    }
}
