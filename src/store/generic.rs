//! Generic task store with all domain logic delegating to a [`StorageBackend`].
//!
//! [`GenericTaskStore`] implements every domain operation (state machine
//! transitions, outcome clamping, CAS-based completion, JSON
//! serialization) on top of any [`StorageBackend`] implementation.
//!
//! Backends remain dumb key-value stores; all intelligence lives here.
//!
//! # Construction
//!
//! ```
//! use artifact_tasks::store::generic::GenericTaskStore;
//! use artifact_tasks::store::memory::InMemoryBackend;
//! use artifact_tasks::store::StoreConfig;
//!
//! let store = GenericTaskStore::new(InMemoryBackend::new())
//!     .with_config(StoreConfig::default());
//! assert_eq!(store.config().max_metrics_entries, 64);
//! ```
//!
//! # CAS Semantics
//!
//! `create` uses [`StorageBackend::put_if_absent`], so a second create with
//! the same id fails with [`TaskError::AlreadyExists`]. `apply_completion`
//! reads the record, checks it is still `processing`, and writes the
//! terminal record with [`StorageBackend::put_if_version`]. When that write
//! loses to a concurrent completion, the store re-reads and reports
//! [`TaskError::DuplicateCallback`] with the winning status.

use chrono::{DateTime, Utc};

use crate::domain::{CompletionOutcome, TaskRecord};
use crate::error::TaskError;
use crate::store::backend::{make_key, StorageBackend, StorageError, TASK_KEY_PREFIX};
use crate::store::StoreConfig;

/// Generic task store that delegates all storage to a [`StorageBackend`].
///
/// # Type Parameters
///
/// * `B` - A [`StorageBackend`] implementation (in-memory, Redis, etc.)
#[derive(Debug)]
pub struct GenericTaskStore<B: StorageBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: StorageBackend> GenericTaskStore<B> {
    /// Creates a new generic task store with `StoreConfig::default()`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    /// Sets the storage configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---- Serialization helpers (private) ----

    fn serialize_record(record: &TaskRecord) -> Result<Vec<u8>, TaskError> {
        serde_json::to_vec(record)
            .map_err(|e| TaskError::Store(format!("failed to serialize TaskRecord: {e}")))
    }

    fn deserialize_record(data: &[u8]) -> Result<TaskRecord, TaskError> {
        serde_json::from_slice(data)
            .map_err(|e| TaskError::Store(format!("failed to deserialize TaskRecord: {e}")))
    }

    fn map_storage_error(err: StorageError, task_id: &str) -> TaskError {
        match err {
            StorageError::NotFound { .. } => TaskError::NotFound {
                task_id: task_id.to_string(),
            },
            StorageError::AlreadyExists { .. } => TaskError::AlreadyExists {
                task_id: task_id.to_string(),
            },
            StorageError::VersionConflict {
                expected, actual, ..
            } => TaskError::ConcurrentModification {
                task_id: task_id.to_string(),
                expected_version: expected,
                actual_version: actual,
            },
            StorageError::Backend { message, .. } => TaskError::Store(message),
        }
    }

    async fn read(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        let versioned = self
            .backend
            .get(&make_key(task_id))
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;
        let mut record = Self::deserialize_record(&versioned.data)?;
        record.version = versioned.version;
        Ok(record)
    }

    /// Fits an outcome into the [`StoreConfig`] limits.
    ///
    /// Oversized outcomes are cut down, never rejected: the error message
    /// and filename are truncated on a char boundary and metrics past the
    /// limit are dropped in key order.
    fn clamp_outcome(&self, task_id: &str, outcome: CompletionOutcome) -> CompletionOutcome {
        match outcome {
            CompletionOutcome::Success(mut result) => {
                if result.metrics.len() > self.config.max_metrics_entries {
                    tracing::warn!(
                        task_id,
                        count = result.metrics.len(),
                        limit = self.config.max_metrics_entries,
                        "dropping excess metrics"
                    );
                    result.metrics = std::mem::take(&mut result.metrics)
                        .into_iter()
                        .take(self.config.max_metrics_entries)
                        .collect();
                }
                if result.artifact.filename.len() > self.config.max_filename_bytes {
                    tracing::warn!(
                        task_id,
                        bytes = result.artifact.filename.len(),
                        limit = self.config.max_filename_bytes,
                        "truncating artifact filename"
                    );
                    truncate_on_char_boundary(
                        &mut result.artifact.filename,
                        self.config.max_filename_bytes,
                    );
                }
                CompletionOutcome::Success(result)
            },
            CompletionOutcome::Error { mut message } => {
                if message.len() > self.config.max_error_message_bytes {
                    tracing::warn!(
                        task_id,
                        bytes = message.len(),
                        limit = self.config.max_error_message_bytes,
                        "truncating error message"
                    );
                    truncate_on_char_boundary(&mut message, self.config.max_error_message_bytes);
                }
                CompletionOutcome::Error { message }
            },
        }
    }

    // ---- Domain operations (public) ----

    /// Persists a new record. The id must be unused.
    pub async fn create(&self, mut record: TaskRecord) -> Result<TaskRecord, TaskError> {
        if record.is_terminal() {
            return Err(TaskError::validation(format!(
                "task {} must be created in processing, not {}",
                record.task_id, record.status
            )));
        }

        let key = make_key(&record.task_id);
        let bytes = Self::serialize_record(&record)?;
        let version = self
            .backend
            .put_if_absent(&key, &bytes)
            .await
            .map_err(|e| Self::map_storage_error(e, &record.task_id))?;
        record.version = version;

        Ok(record)
    }

    /// Retrieves a task by ID.
    pub async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.read(task_id).await
    }

    /// Applies a completion outcome with CAS-based atomicity.
    pub async fn apply_completion(
        &self,
        task_id: &str,
        outcome: CompletionOutcome,
    ) -> Result<TaskRecord, TaskError> {
        let record = self.read(task_id).await?;

        if record.is_terminal() {
            return Err(TaskError::DuplicateCallback {
                task_id: task_id.to_string(),
                status: record.status,
            });
        }

        let outcome = self.clamp_outcome(task_id, outcome);
        let mut completed = record.complete(outcome, Utc::now())?;
        let bytes = Self::serialize_record(&completed)?;

        match self
            .backend
            .put_if_version(&make_key(task_id), &bytes, record.version)
            .await
        {
            Ok(version) => {
                completed.version = version;
                Ok(completed)
            },
            Err(StorageError::VersionConflict {
                expected, actual, ..
            }) => {
                // Lost the race; find out to whom.
                let current = self.read(task_id).await?;
                if current.is_terminal() {
                    Err(TaskError::DuplicateCallback {
                        task_id: task_id.to_string(),
                        status: current.status,
                    })
                } else {
                    Err(TaskError::ConcurrentModification {
                        task_id: task_id.to_string(),
                        expected_version: expected,
                        actual_version: actual,
                    })
                }
            },
            Err(e) => Err(Self::map_storage_error(e, task_id)),
        }
    }

    /// Deletes terminal records with `completed_at < cutoff`.
    ///
    /// Records that fail to decode are logged and skipped.
    pub async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TaskError> {
        let entries = self
            .backend
            .list_by_prefix(TASK_KEY_PREFIX)
            .await
            .map_err(|e| Self::map_storage_error(e, ""))?;

        let mut removed = 0;
        for (key, versioned) in entries {
            let record = match Self::deserialize_record(&versioned.data) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping undecodable task record");
                    continue;
                },
            };
            let expired = record.is_terminal()
                && record.completed_at.is_some_and(|completed| completed < cutoff);
            if !expired {
                continue;
            }
            let deleted = self
                .backend
                .delete(&key)
                .await
                .map_err(|e| Self::map_storage_error(e, &record.task_id))?;
            if deleted {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Shortens `s` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
