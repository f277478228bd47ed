//! Service configuration from flags and environment.
//!
//! Every flag can also be set through the environment variable named in
//! its `env` attribute. Provider credentials and placement hints are passed
//! through untouched.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::dispatch::DispatchConfig;

/// Which compute provider to dispatch through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// POST spawn requests to `--dispatch-endpoint`.
    Http,
    /// Record spawn requests in memory; nothing is started.
    Memory,
}

/// Configuration errors found before the server starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `--provider http` without an endpoint.
    #[error("--dispatch-endpoint (DISPATCH_ENDPOINT) is required with the http provider")]
    MissingDispatchEndpoint,

    /// A URL flag that is not http(s).
    #[error("{flag} must be an http:// or https:// URL, got {value}")]
    InvalidUrl {
        /// Flag name.
        flag: &'static str,
        /// Rejected value.
        value: String,
    },

    /// A duration flag set to zero.
    #[error("{flag} must be greater than zero")]
    ZeroDuration {
        /// Flag name.
        flag: &'static str,
    },
}

/// Command line for the task service.
#[derive(Debug, Clone, Parser)]
#[command(name = "artifact-tasks")]
#[command(about = "Dispatch work to ephemeral compute and serve its artifacts")]
#[command(version)]
pub struct ServiceConfig {
    /// Listen address.
    #[arg(long, env = "TASKS_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Externally reachable base URL, used to build callback URLs.
    #[arg(long, env = "TASKS_PUBLIC_URL", default_value = "http://localhost:3000")]
    pub public_url: String,

    /// Compute provider.
    #[arg(long, env = "TASKS_PROVIDER", value_enum, default_value = "http")]
    pub provider: ProviderKind,

    /// Spawn endpoint for the http provider.
    #[arg(long, env = "DISPATCH_ENDPOINT")]
    pub dispatch_endpoint: Option<String>,

    /// Bearer credential for the spawn endpoint.
    #[arg(long, env = "DISPATCH_TOKEN", hide_env_values = true)]
    pub dispatch_token: Option<String>,

    /// Spawn request timeout in seconds.
    #[arg(long, env = "DISPATCH_TIMEOUT_SECS", default_value = "30")]
    pub dispatch_timeout_secs: u64,

    /// Image passed through to the compute platform.
    #[arg(long, env = "COMPUTE_IMAGE")]
    pub compute_image: Option<String>,

    /// Placement hint passed through to the compute platform.
    #[arg(long, env = "COMPUTE_REGION")]
    pub compute_region: Option<String>,

    /// Artifact bucket. Also the root directory of the local object store.
    #[arg(long, env = "ARTIFACT_BUCKET", default_value = "./artifacts")]
    pub artifact_bucket: String,

    /// Keep terminal task records this many seconds. Unset keeps them forever.
    #[arg(long, env = "TASKS_RETENTION_SECS")]
    pub retention_secs: Option<u64>,

    /// Seconds between retention sweeps.
    #[arg(long, env = "TASKS_SWEEP_INTERVAL_SECS", default_value = "300")]
    pub sweep_interval_secs: u64,

    /// Store task records in Redis instead of memory.
    #[cfg(feature = "redis")]
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
}

fn check_url(flag: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            flag,
            value: value.to_string(),
        })
    }
}

impl ServiceConfig {
    /// Checks flag combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("--public-url", &self.public_url)?;

        if self.provider == ProviderKind::Http {
            let endpoint = self
                .dispatch_endpoint
                .as_deref()
                .ok_or(ConfigError::MissingDispatchEndpoint)?;
            check_url("--dispatch-endpoint", endpoint)?;
        }
        if self.dispatch_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                flag: "--dispatch-timeout-secs",
            });
        }
        if self.retention_secs.is_some() && self.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                flag: "--sweep-interval-secs",
            });
        }
        Ok(())
    }

    /// Settings for spawn requests.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            public_url: self.public_url.clone(),
            image: self.compute_image.clone(),
            region: self.compute_region.clone(),
            artifact_bucket: self.artifact_bucket.clone(),
        }
    }

    /// Spawn request timeout.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// Retention window for terminal records, if retention is enabled.
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    /// Time between retention sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
