//! In-memory storage backend and task store.
//!
//! [`InMemoryBackend`] provides a thread-safe [`StorageBackend`] implementation
//! using `DashMap<String, (Vec<u8>, u64)>` for concurrent key-value storage.
//! It is a dumb KV store with no domain logic.
//!
//! [`InMemoryTaskStore`] is a thin wrapper around
//! [`GenericTaskStore<InMemoryBackend>`](crate::store::generic::GenericTaskStore)
//! with a zero-argument constructor and `Default` impl.
//!
//! # Concurrency
//!
//! `InMemoryBackend` uses `DashMap` shard locks. `put_if_absent` goes through
//! the entry API and `put_if_version` holds the shard write lock across the
//! compare and the swap, so both are atomic per key.
//!
//! # Examples
//!
//! ```
//! use artifact_tasks::store::memory::InMemoryTaskStore;
//! use artifact_tasks::store::{StoreConfig, TaskStore};
//!
//! let store = InMemoryTaskStore::new().with_config(StoreConfig::default());
//! assert_eq!(store.config().max_filename_bytes, 255);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{CompletionOutcome, TaskRecord};
use crate::error::TaskError;
use crate::store::backend::{StorageBackend, StorageError, VersionedRecord};
use crate::store::generic::GenericTaskStore;

use super::{StoreConfig, TaskStore};

// ---- InMemoryBackend: dumb KV store using DashMap ----

/// Thread-safe in-memory storage backend using [`DashMap`].
///
/// Stores serialized task records as `(Vec<u8>, u64)` tuples where the
/// `u64` is a monotonic version number starting at 1.
///
/// # Examples
///
/// ```
/// use artifact_tasks::store::memory::InMemoryBackend;
/// use artifact_tasks::store::generic::GenericTaskStore;
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.is_empty());
/// let store = GenericTaskStore::new(backend);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    data: DashMap<String, (Vec<u8>, u64)>,
}

impl InMemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Returns the number of records stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the backend contains no records.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        let entry = self.data.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;
        let (data, version) = entry.value();
        Ok(VersionedRecord {
            data: data.clone(),
            version: *version,
        })
    }

    async fn put_if_absent(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert((data.to_vec(), 1));
                Ok(1)
            },
        }
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let mut entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        let current_version = entry.value().1;
        if current_version != expected_version {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError> {
        let results: Vec<(String, VersionedRecord)> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                let (data, version) = entry.value();
                (
                    entry.key().clone(),
                    VersionedRecord {
                        data: data.clone(),
                        version: *version,
                    },
                )
            })
            .collect();
        Ok(results)
    }
}

// ---- InMemoryTaskStore: thin wrapper around GenericTaskStore<InMemoryBackend> ----

/// Thread-safe in-memory task store using [`GenericTaskStore`] with [`InMemoryBackend`].
///
/// Records live only as long as the process. This is the default store for
/// a single service replica and for tests.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    inner: GenericTaskStore<InMemoryBackend>,
}

impl InMemoryTaskStore {
    /// Creates a new in-memory task store with default configuration.
    pub fn new() -> Self {
        Self {
            inner: GenericTaskStore::new(InMemoryBackend::new()),
        }
    }

    /// Sets the storage configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_tasks::store::memory::InMemoryTaskStore;
    /// use artifact_tasks::store::StoreConfig;
    ///
    /// let store = InMemoryTaskStore::new().with_config(StoreConfig {
    ///     max_metrics_entries: 8,
    ///     ..StoreConfig::default()
    /// });
    /// ```
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.inner = self.inner.with_config(config);
        self
    }

    /// Returns a reference to the underlying backend.
    pub fn backend(&self) -> &InMemoryBackend {
        self.inner.backend()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---- TaskStore delegation impl ----

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, TaskError> {
        self.inner.create(record).await
    }

    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.inner.get(task_id).await
    }

    async fn apply_completion(
        &self,
        task_id: &str,
        outcome: CompletionOutcome,
    ) -> Result<TaskRecord, TaskError> {
        self.inner.apply_completion(task_id, outcome).await
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TaskError> {
        self.inner.purge_terminal_before(cutoff).await
    }

    fn config(&self) -> &StoreConfig {
        self.inner.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Backend tests ----

    #[tokio::test]
    async fn get_missing_key_returns_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.get("task:nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn put_if_absent_assigns_version_1() {
        let backend = InMemoryBackend::new();
        let version = backend.put_if_absent("task:a", b"one").await.unwrap();
        assert_eq!(version, 1);
        let record = backend.get("task:a").await.unwrap();
        assert_eq!(record.data, b"one");
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn put_if_absent_refuses_occupied_key() {
        let backend = InMemoryBackend::new();
        backend.put_if_absent("task:a", b"one").await.unwrap();
        let err = backend.put_if_absent("task:a", b"two").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(backend.get("task:a").await.unwrap().data, b"one");
    }

    #[tokio::test]
    async fn put_if_version_succeeds_on_match() {
        let backend = InMemoryBackend::new();
        backend.put_if_absent("task:a", b"one").await.unwrap();
        let version = backend.put_if_version("task:a", b"two", 1).await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(backend.get("task:a").await.unwrap().data, b"two");
    }

    #[tokio::test]
    async fn put_if_version_fails_on_mismatch() {
        let backend = InMemoryBackend::new();
        backend.put_if_absent("task:a", b"one").await.unwrap();
        backend.put_if_version("task:a", b"two", 1).await.unwrap();
        let err = backend
            .put_if_version("task:a", b"three", 1)
            .await
            .unwrap_err();
        match err {
            StorageError::VersionConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            },
            other => panic!("expected VersionConflict, got {other}"),
        }
    }

    #[tokio::test]
    async fn put_if_version_fails_on_missing_key() {
        let backend = InMemoryBackend::new();
        let err = backend
            .put_if_version("task:none", b"x", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend.put_if_absent("task:a", b"one").await.unwrap();
        assert!(backend.delete("task:a").await.unwrap());
        assert!(!backend.delete("task:a").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn list_by_prefix_returns_matching() {
        let backend = InMemoryBackend::new();
        backend.put_if_absent("task:a", b"1").await.unwrap();
        backend.put_if_absent("task:b", b"2").await.unwrap();
        backend.put_if_absent("other:c", b"3").await.unwrap();

        let mut keys: Vec<String> = backend
            .list_by_prefix("task:")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["task:a".to_string(), "task:b".to_string()]);
        assert_eq!(backend.len(), 3);
    }
}
