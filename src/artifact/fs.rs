//! Filesystem object store: the bucket is a root directory and keys are
//! relative paths below it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use super::{validate_key, ArtifactError, ArtifactObject, ArtifactStore};

/// Object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    bucket: String,
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            bucket: root.display().to_string(),
            root,
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Hidden, uniquely named file next to `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}

fn io_error(key: &str, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), ArtifactError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(key, e))?;
        }
        // Readers only ever see a complete file: write a sibling, then rename.
        let tmp = temp_sibling(&path);
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(key, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(key, e));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ArtifactObject>, ArtifactError> {
        let path = self.path_for(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key, e)),
        };
        let metadata = file.metadata().await.map_err(|e| io_error(key, e))?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(ArtifactObject {
            size: metadata.len(),
            body: Box::pin(ReaderStream::new(file)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    #[tokio::test]
    async fn put_then_get_streams_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store
            .put("artifacts/t/out.bin", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert!(dir.path().join("artifacts/t/out.bin").is_file());

        let object = store.get("artifacts/t/out.bin").await.unwrap().unwrap();
        assert_eq!(object.size, 5);
        let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(store.get("artifacts/none.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn directory_is_not_an_object() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("artifacts/t")).unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(store.get("artifacts/t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn escape_attempt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(matches!(
            store.get("../outside").await,
            Err(ArtifactError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.put("a/out.bin", Bytes::from_static(b"first")).await.unwrap();
        store.put("a/out.bin", Bytes::from_static(b"second!")).await.unwrap();

        let object = store.get("a/out.bin").await.unwrap().unwrap();
        assert_eq!(object.size, 7);

        let names: Vec<String> = std::fs::read_dir(dir.path().join("a"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.bin".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_reader_never_sees_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FsArtifactStore::new(dir.path()));
        let small = Bytes::from(vec![1u8; 16]);
        let large = Bytes::from(vec![2u8; 256 * 1024]);
        store.put("k/out.bin", small.clone()).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let data = if i % 2 == 0 { large.clone() } else { small.clone() };
                    store.put("k/out.bin", data).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let object = store.get("k/out.bin").await.unwrap().unwrap();
            assert!(object.size == 16 || object.size == 256 * 1024, "saw {} bytes", object.size);
            let body: Vec<Bytes> = object.body.try_collect().await.unwrap();
            assert_eq!(body.concat().len() as u64, object.size);
        }
        writer.await.unwrap();
    }
}
