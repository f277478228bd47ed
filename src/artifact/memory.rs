//! In-memory object store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{validate_key, ArtifactError, ArtifactObject, ArtifactStore};

/// Size of the chunks the body stream is split into.
const CHUNK_SIZE: usize = 64 * 1024;

/// Object store backed by a `DashMap`.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    bucket: String,
    objects: DashMap<String, Bytes>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store named `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// Removes the object at `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.objects.remove(key).is_some()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), ArtifactError> {
        validate_key(key)?;
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ArtifactObject>, ArtifactError> {
        validate_key(key)?;
        let Some(data) = self.objects.get(key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };

        let size = data.len() as u64;
        let chunks: Vec<Result<Bytes, std::io::Error>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(Some(ArtifactObject {
            size,
            body: Box::pin(futures::stream::iter(chunks)),
        }))
    }
}
