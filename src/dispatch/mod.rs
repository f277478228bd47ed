//! Compute provider abstraction.
//!
//! A [`ComputeProvider`] accepts a declarative [`SpawnRequest`] and returns
//! a [`DispatchHandle`] once the external platform has accepted the work.
//! Acceptance is all a provider reports: the outcome arrives later through
//! the completion callback whose URL is embedded in the request.
//!
//! Implementations:
//!
//! - [`http::HttpComputeProvider`] -- POSTs the spawn request to a
//!   platform endpoint with bearer credentials.
//! - [`memory::InMemoryComputeProvider`] -- records requests in memory; used
//!   in tests and local runs.

pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::{
    ARTIFACT_KEY_PREFIX, ENV_ARTIFACT_BUCKET, ENV_ARTIFACT_PREFIX, ENV_CALLBACK_URL, ENV_SUBJECT,
    ENV_TASK_ID, ENV_TASK_OPTIONS, SPAWN_NAME_PREFIX,
};
use crate::error::TaskError;
use crate::types::params::TaskOptions;

/// Settings that shape every spawn request.
///
/// Passed through to the provider without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Externally reachable base URL of this service, used to build
    /// callback URLs.
    pub public_url: String,
    /// Container image (or equivalent) for the compute.
    pub image: Option<String>,
    /// Placement hint.
    pub region: Option<String>,
    /// Object store bucket the compute writes its artifact to.
    pub artifact_bucket: String,
}

impl DispatchConfig {
    /// Config with no image or region.
    pub fn new(public_url: impl Into<String>, artifact_bucket: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            image: None,
            region: None,
            artifact_bucket: artifact_bucket.into(),
        }
    }

    /// Callback URL for `task_id`: `{public_url}/tasks/{task_id}/callback`.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_tasks::dispatch::DispatchConfig;
    ///
    /// let config = DispatchConfig::new("https://tasks.example.com/", "bucket");
    /// assert_eq!(
    ///     config.callback_url("abc"),
    ///     "https://tasks.example.com/tasks/abc/callback"
    /// );
    /// ```
    pub fn callback_url(&self, task_id: &str) -> String {
        format!(
            "{}/tasks/{task_id}/callback",
            self.public_url.trim_end_matches('/')
        )
    }
}

/// Declarative description of the compute to start for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    /// Task the compute works for.
    pub task_id: String,
    /// Resource name, `task-{task_id}`.
    pub name: String,
    /// Container image, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Placement hint, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Where the compute reports completion.
    pub callback_url: String,
    /// Environment handed to the compute.
    pub env: BTreeMap<String, String>,
    /// Ask the platform to tear the resource down once it exits.
    pub auto_destroy: bool,
}

impl SpawnRequest {
    /// Builds the spawn request for a validated task.
    pub fn for_task(
        task_id: &str,
        subject: &str,
        options: &TaskOptions,
        config: &DispatchConfig,
    ) -> Result<Self, TaskError> {
        let callback_url = config.callback_url(task_id);
        let options_json = serde_json::to_string(options)
            .map_err(|e| TaskError::Store(format!("failed to encode task options: {e}")))?;

        let env = BTreeMap::from([
            (ENV_TASK_ID.to_string(), task_id.to_string()),
            (ENV_CALLBACK_URL.to_string(), callback_url.clone()),
            (ENV_SUBJECT.to_string(), subject.to_string()),
            (ENV_TASK_OPTIONS.to_string(), options_json),
            (ENV_ARTIFACT_BUCKET.to_string(), config.artifact_bucket.clone()),
            (
                ENV_ARTIFACT_PREFIX.to_string(),
                format!("{ARTIFACT_KEY_PREFIX}/{task_id}/"),
            ),
        ]);

        Ok(Self {
            task_id: task_id.to_string(),
            name: format!("{SPAWN_NAME_PREFIX}{task_id}"),
            image: config.image.clone(),
            region: config.region.clone(),
            callback_url,
            env,
            auto_destroy: true,
        })
    }
}

/// Provider-side identity of a spawned compute resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchHandle {
    /// Name of the provider that accepted the spawn.
    pub provider: String,
    /// Provider-assigned resource id.
    pub id: String,
    /// Whatever else the provider reported (name, region, state).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl DispatchHandle {
    /// Handle with no details.
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            details: BTreeMap::new(),
        }
    }
}

/// Why a spawn call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The platform answered with a non-success status.
    #[error("provider rejected spawn with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The platform did not answer in time.
    #[error("provider did not respond before the timeout")]
    Timeout,

    /// Connection-level failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error text.
        message: String,
    },

    /// The platform answered 2xx but the body was not a usable handle.
    #[error("malformed provider response: {message}")]
    MalformedResponse {
        /// What was wrong with the body.
        message: String,
    },
}

/// Starts external compute for a task.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Short provider name, recorded on the dispatch handle.
    fn name(&self) -> &str;

    /// Asks the platform to start the compute described by `request`.
    ///
    /// Returns once the platform has accepted (or refused) the request.
    /// Never retries.
    async fn spawn(&self, request: &SpawnRequest) -> Result<DispatchHandle, DispatchError>;
}
