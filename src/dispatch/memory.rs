//! In-process compute provider.
//!
//! Accepts every spawn (unless told to fail) and keeps the requests so
//! tests and local runs can see what would have been started.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ComputeProvider, DispatchError, DispatchHandle, SpawnRequest};

const PROVIDER_NAME: &str = "memory";

/// Provider that records spawn requests instead of starting anything.
///
/// # Examples
///
/// ```
/// use artifact_tasks::dispatch::memory::InMemoryComputeProvider;
/// use artifact_tasks::dispatch::{ComputeProvider, DispatchConfig, SpawnRequest};
/// use artifact_tasks::TaskOptions;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let provider = InMemoryComputeProvider::new();
/// let config = DispatchConfig::new("http://localhost:3000", "bucket");
/// let request = SpawnRequest::for_task("t-1", "X1", &TaskOptions::default(), &config).unwrap();
///
/// let handle = provider.spawn(&request).await.unwrap();
/// assert_eq!(handle.provider, "memory");
/// assert_eq!(provider.requests().len(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryComputeProvider {
    requests: Mutex<Vec<SpawnRequest>>,
    failure: Mutex<Option<DispatchError>>,
    next_id: AtomicU64,
}

impl InMemoryComputeProvider {
    /// Creates a provider that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following spawn fail with `error` until cleared.
    pub fn fail_with(&self, error: DispatchError) {
        *self.failure.lock() = Some(error);
    }

    /// Accepts spawns again.
    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Requests accepted so far, in order.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ComputeProvider for InMemoryComputeProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn spawn(&self, request: &SpawnRequest) -> Result<DispatchHandle, DispatchError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.requests.lock().push(request.clone());

        let mut handle = DispatchHandle::new(PROVIDER_NAME, format!("local-{id}"));
        handle
            .details
            .insert("name".to_string(), request.name.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchConfig;
    use crate::types::TaskOptions;

    fn request(id: &str) -> SpawnRequest {
        SpawnRequest::for_task(
            id,
            "subject",
            &TaskOptions::default(),
            &DispatchConfig::new("http://localhost", "b"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn assigns_distinct_ids() {
        let provider = InMemoryComputeProvider::new();
        let a = provider.spawn(&request("a")).await.unwrap();
        let b = provider.spawn(&request("b")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.details["name"], "task-a");
    }

    #[tokio::test]
    async fn failure_is_sticky_until_cleared() {
        let provider = InMemoryComputeProvider::new();
        provider.fail_with(DispatchError::Timeout);
        assert_eq!(
            provider.spawn(&request("a")).await.unwrap_err(),
            DispatchError::Timeout
        );
        assert!(provider.requests().is_empty());

        provider.clear_failure();
        assert!(provider.spawn(&request("a")).await.is_ok());
        assert_eq!(provider.requests().len(), 1);
    }
}
