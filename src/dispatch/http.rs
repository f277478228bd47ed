//! HTTP compute provider.
//!
//! Sends the [`SpawnRequest`] as JSON to a platform endpoint and expects a
//! JSON body with at least a non-empty `id`:
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {token}
//!
//! 201 {"id": "machine-123", "name": "task-...", "region": "ord", "state": "created"}
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ComputeProvider, DispatchError, DispatchHandle, SpawnRequest};

const PROVIDER_NAME: &str = "http";

#[derive(Debug, Deserialize)]
struct SpawnResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Provider that spawns compute through an HTTP API.
#[derive(Debug, Clone)]
pub struct HttpComputeProvider {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpComputeProvider {
    /// Creates a provider posting to `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: None,
            timeout,
        }
    }

    /// Sends `token` as a bearer credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replaces the HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn classify(err: &reqwest::Error) -> DispatchError {
        if err.is_timeout() {
            DispatchError::Timeout
        } else if err.is_decode() {
            DispatchError::MalformedResponse {
                message: err.to_string(),
            }
        } else {
            DispatchError::Transport {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ComputeProvider for HttpComputeProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn spawn(&self, request: &SpawnRequest) -> Result<DispatchHandle, DispatchError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| Self::classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| Self::classify(&e))?;
        let parsed: SpawnResponse =
            serde_json::from_slice(&bytes).map_err(|e| DispatchError::MalformedResponse {
                message: e.to_string(),
            })?;
        if parsed.id.trim().is_empty() {
            return Err(DispatchError::MalformedResponse {
                message: "response id is empty".to_string(),
            });
        }

        let details: BTreeMap<String, String> = [
            ("name", parsed.name),
            ("region", parsed.region),
            ("state", parsed.state),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();

        Ok(DispatchHandle {
            provider: PROVIDER_NAME.to_string(),
            id: parsed.id,
            details,
        })
    }
}
