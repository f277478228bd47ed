//! Task store trait, generic implementation, and supporting types.
//!
//! # Architecture
//!
//! The task storage system has three layers:
//!
//! 1. **[`TaskStore`]** -- A type-erasure interface for use with
//!    `Arc<dyn TaskStore>` in the dispatcher, callback ingestor and gateway.
//!
//! 2. **[`GenericTaskStore<B>`](generic::GenericTaskStore)** -- All domain
//!    logic (state machine, outcome limits, CAS-based completion, JSON
//!    serialization). Has a blanket `TaskStore` impl.
//!
//! 3. **[`StorageBackend`]** -- Dumb KV trait that backends implement
//!    (in-memory, Redis). No domain logic.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](crate::store::memory::InMemoryBackend) -- Thread-safe
//!   in-memory backend using `DashMap`. Used by
//!   [`InMemoryTaskStore`](crate::store::memory::InMemoryTaskStore).
//! - `RedisBackend` -- Redis backend for deployments with more than one
//!   service replica. Available behind the `redis` feature flag.
//!
//! The [`sweeper`] module purges old terminal records on a timer.

pub mod backend;
pub mod generic;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod sweeper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use backend::{StorageBackend, StorageError, VersionedRecord};

use crate::domain::{CompletionOutcome, TaskRecord};
use crate::error::TaskError;

/// Limits applied to completion outcomes before they are stored.
///
/// An outcome over a limit is clamped to fit; the completion is still
/// applied.
///
/// # Defaults
///
/// | Setting                   | Default | Description                         |
/// |---------------------------|---------|-------------------------------------|
/// | `max_metrics_entries`     | 64      | Counters per success result         |
/// | `max_error_message_bytes` | 4,096   | Length of an error callback message |
/// | `max_filename_bytes`      | 255     | Length of the artifact display name |
///
/// # Examples
///
/// ```
/// use artifact_tasks::store::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.max_metrics_entries, 64);
/// assert_eq!(config.max_error_message_bytes, 4096);
/// assert_eq!(config.max_filename_bytes, 255);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of metric counters on a success result.
    pub max_metrics_entries: usize,

    /// Maximum length in bytes of an error message.
    pub max_error_message_bytes: usize,

    /// Maximum length in bytes of an artifact filename.
    pub max_filename_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_metrics_entries: 64,
            max_error_message_bytes: 4096,
            max_filename_bytes: 255,
        }
    }
}

/// Object-safe task persistence interface.
///
/// Every operation is keyed by task id and independent of every other id.
/// `create` and `apply_completion` are the only writes the lifecycle
/// performs; `purge_terminal_before` exists for retention.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a freshly dispatched record.
    ///
    /// Fails with [`TaskError::AlreadyExists`] if the id is taken. The
    /// returned record carries its backend version.
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, TaskError>;

    /// Returns the latest committed record or [`TaskError::NotFound`].
    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError>;

    /// Moves a `processing` task to its terminal state.
    ///
    /// Returns [`TaskError::DuplicateCallback`] if the task was already
    /// terminal, including when a concurrent completion won the race.
    async fn apply_completion(
        &self,
        task_id: &str,
        outcome: CompletionOutcome,
    ) -> Result<TaskRecord, TaskError>;

    /// Deletes terminal records completed before `cutoff`. Returns the
    /// number removed. `processing` records are never removed.
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TaskError>;

    /// The limits this store clamps outcomes to.
    fn config(&self) -> &StoreConfig;
}

#[async_trait]
impl<B: StorageBackend + 'static> TaskStore for generic::GenericTaskStore<B> {
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, TaskError> {
        self.create(record).await
    }

    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.get(task_id).await
    }

    async fn apply_completion(
        &self,
        task_id: &str,
        outcome: CompletionOutcome,
    ) -> Result<TaskRecord, TaskError> {
        self.apply_completion(task_id, outcome).await
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TaskError> {
        self.purge_terminal_before(cutoff).await
    }

    fn config(&self) -> &StoreConfig {
        self.config()
    }
}
