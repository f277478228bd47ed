//! Object store access for task artifacts.
//!
//! The service never writes artifacts in normal operation; the spawned
//! compute does. It only needs to stream an object back by key, and to
//! know its size to check it against what the callback reported. `put` is
//! there for local runs and tests.

pub mod fs;
pub mod memory;

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// Streaming body of an artifact.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// An object opened for reading.
pub struct ArtifactObject {
    /// Size in bytes as stored.
    pub size: u64,
    /// Object contents.
    pub body: ByteStream,
}

impl std::fmt::Debug for ArtifactObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Object store failures.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The key is empty, absolute, or walks out of the bucket.
    #[error("invalid artifact key: {key}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// Reading or writing the object failed.
    #[error("artifact I/O error at {key}: {source}")]
    Io {
        /// The key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Key-addressed object storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Bucket identifier handed to spawned compute.
    fn bucket(&self) -> &str;

    /// Writes `data` at `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ArtifactError>;

    /// Opens the object at `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<ArtifactObject>, ArtifactError>;
}

/// Rejects keys that are empty, absolute, or contain `..` or empty segments.
///
/// # Examples
///
/// ```
/// use artifact_tasks::artifact::validate_key;
///
/// assert!(validate_key("artifacts/t-1/out.bin").is_ok());
/// assert!(validate_key("/etc/passwd").is_err());
/// assert!(validate_key("artifacts/../secret").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<(), ArtifactError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.starts_with('\\')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(ArtifactError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("a").is_ok());
        assert!(validate_key("artifacts/X1/out.bin").is_ok());
        for bad in ["", "/a", "a//b", "a/./b", "../a", "a/..", "a\\b", "a/"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
