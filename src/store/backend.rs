//! Low-level key-value storage backend trait and supporting types.
//!
//! The [`StorageBackend`] trait defines the contract that all storage engines
//! implement: [`get`](StorageBackend::get),
//! [`put_if_absent`](StorageBackend::put_if_absent),
//! [`put_if_version`](StorageBackend::put_if_version),
//! [`delete`](StorageBackend::delete) and
//! [`list_by_prefix`](StorageBackend::list_by_prefix).
//!
//! Domain logic (state machine validation, outcome limits, serialization)
//! does **not** belong here. Backends are dumb KV stores; domain logic lives
//! in `GenericTaskStore`.
//!
//! # Key Structure
//!
//! Keys are `task:{task_id}`. Task ids are `UUIDv4` strings, so the prefix
//! `task:` scopes a listing to task records.
//!
//! # Versioning
//!
//! Each stored record carries a monotonic `u64` version number starting at
//! 1, incremented on every successful write. The
//! [`put_if_version`](StorageBackend::put_if_version) method provides
//! compare-and-swap (CAS) semantics for optimistic concurrency.

use std::fmt;

use async_trait::async_trait;

/// Prefix shared by every task record key.
pub const TASK_KEY_PREFIX: &str = "task:";

/// A stored record paired with its monotonic version number.
///
/// # Examples
///
/// ```
/// use artifact_tasks::store::backend::VersionedRecord;
///
/// let record = VersionedRecord {
///     data: b"{}".to_vec(),
///     version: 1,
/// };
/// assert_eq!(record.version, 1);
/// ```
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The serialized task record bytes (JSON).
    pub data: Vec<u8>,

    /// Monotonic version number. Starts at 1, increments on each
    /// successful write.
    pub version: u64,
}

/// Errors that can occur during raw storage operations.
///
/// `GenericTaskStore` maps these to [`TaskError`](crate::error::TaskError)
/// variants before surfacing to callers.
///
/// # Examples
///
/// ```
/// use artifact_tasks::store::backend::StorageError;
///
/// let err = StorageError::VersionConflict {
///     key: "task:abc".to_string(),
///     expected: 2,
///     actual: 3,
/// };
/// assert!(err.to_string().contains("expected 2"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// The requested key was not found in storage.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A [`put_if_absent`](StorageBackend::put_if_absent) call found an
    /// existing record.
    AlreadyExists {
        /// The occupied key.
        key: String,
    },

    /// A [`put_if_version`](StorageBackend::put_if_version) call failed
    /// because the stored version does not match the expected version.
    VersionConflict {
        /// The key where the conflict occurred.
        key: String,
        /// The version the caller expected.
        expected: u64,
        /// The actual version found in storage.
        actual: u64,
    },

    /// An I/O or backend-specific error occurred.
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Wraps a backend-specific error.
    pub fn backend<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::AlreadyExists { key } => write!(f, "key already exists: {key}"),
            Self::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on key {key}: expected {expected}, found {actual}"
            ),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value storage backend for task persistence.
///
/// Implementations provide raw storage primitives and must be `Send + Sync`
/// so one backend can serve concurrent request handlers. Backends must
/// never interpret the stored bytes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a record by key.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the given key.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError>;

    /// Stores a record only if the key is unoccupied. Returns version 1.
    ///
    /// # Errors
    ///
    /// - [`StorageError::AlreadyExists`] if the key already holds a record.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put_if_absent(&self, key: &str, data: &[u8]) -> Result<u64, StorageError>;

    /// Stores a record only if the current version matches `expected_version`.
    ///
    /// This is the compare-and-swap (CAS) primitive. On success the version
    /// is incremented and returned.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the given key.
    /// - [`StorageError::VersionConflict`] if the stored version does not
    ///   match `expected_version`.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError>;

    /// Deletes a record by key.
    ///
    /// Returns `true` if the key existed and was deleted, `false` if it did
    /// not exist.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Lists all records whose key starts with the given prefix.
    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError>;
}

/// Constructs the storage key for a task.
///
/// # Examples
///
/// ```
/// use artifact_tasks::store::backend::make_key;
///
/// assert_eq!(make_key("abc"), "task:abc");
/// ```
pub fn make_key(task_id: &str) -> String {
    format!("{TASK_KEY_PREFIX}{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = StorageError::NotFound {
            key: "task:1".to_string(),
        };
        assert_eq!(err.to_string(), "key not found: task:1");

        let err = StorageError::AlreadyExists {
            key: "task:1".to_string(),
        };
        assert_eq!(err.to_string(), "key already exists: task:1");

        let err = StorageError::Backend {
            message: "connection reset".to_string(),
            source: None,
        };
        assert_eq!(err.to_string(), "backend error: connection reset");
    }

    #[test]
    fn backend_error_exposes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StorageError::backend("write failed", io);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "disk gone");
    }

    #[test]
    fn keys_share_prefix() {
        assert!(make_key("abc").starts_with(TASK_KEY_PREFIX));
    }
}
