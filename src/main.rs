use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use artifact_tasks::artifact::fs::FsArtifactStore;
use artifact_tasks::config::{ProviderKind, ServiceConfig};
use artifact_tasks::dispatch::http::HttpComputeProvider;
use artifact_tasks::dispatch::memory::InMemoryComputeProvider;
use artifact_tasks::dispatch::ComputeProvider;
use artifact_tasks::store::sweeper::RetentionSweeper;
use artifact_tasks::store::TaskStore;
use artifact_tasks::{api, InMemoryTaskStore, TaskService};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = ServiceConfig::parse();
    config.validate().context("invalid configuration")?;

    let store = build_store(&config).await?;
    let provider = build_provider(&config)?;
    let artifacts = Arc::new(FsArtifactStore::new(&config.artifact_bucket));

    if let Some(retention) = config.retention() {
        tracing::info!(
            retention_secs = retention.as_secs(),
            interval_secs = config.sweep_interval().as_secs(),
            "retention sweeper enabled"
        );
        RetentionSweeper::new(store.clone(), retention, config.sweep_interval()).spawn();
    }

    let service = Arc::new(TaskService::new(
        store,
        provider,
        artifacts,
        config.dispatch_config(),
    ));
    let app = api::router(service);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        addr = %config.bind,
        public_url = %config.public_url,
        provider = ?config.provider,
        "task service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("task service stopped");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(feature = "redis")]
async fn build_store(config: &ServiceConfig) -> Result<Arc<dyn TaskStore>> {
    use artifact_tasks::store::generic::GenericTaskStore;
    use artifact_tasks::store::redis::RedisBackend;

    if let Some(url) = &config.redis_url {
        let backend = RedisBackend::new(url)
            .await
            .context("failed to connect to Redis")?;
        tracing::info!("storing task records in Redis");
        return Ok(Arc::new(GenericTaskStore::new(backend)));
    }
    Ok(Arc::new(InMemoryTaskStore::new()))
}

#[cfg(not(feature = "redis"))]
async fn build_store(_config: &ServiceConfig) -> Result<Arc<dyn TaskStore>> {
    Ok(Arc::new(InMemoryTaskStore::new()))
}

fn build_provider(config: &ServiceConfig) -> Result<Arc<dyn ComputeProvider>> {
    match config.provider {
        ProviderKind::Memory => {
            tracing::warn!("memory provider selected; no compute will be started");
            Ok(Arc::new(InMemoryComputeProvider::new()))
        },
        ProviderKind::Http => {
            let endpoint = config
                .dispatch_endpoint
                .clone()
                .context("dispatch endpoint missing")?;
            let mut provider = HttpComputeProvider::new(endpoint, config.dispatch_timeout());
            if let Some(token) = &config.dispatch_token {
                provider = provider.with_token(token.clone());
            }
            Ok(Arc::new(provider))
        },
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
