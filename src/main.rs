// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

mod client;
mod config;
mod health;
mod metrics;
mod server;

use crate::{
    client::{ApiClient, RetryStrategy},
    health::{HealthPoller, HealthReporter, HealthSource, RemoteHealthSource},
    metrics::MetricsRegistry,
    server::{RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quantx_health=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let collector = metrics_registry.collector();

    let client = Arc::new(ApiClient::new(&config.api));
    let retry = RetryStrategy::from_api_config(&config.api);

    let sources: Vec<Arc<dyn HealthSource>> = config
        .health
        .sources
        .iter()
        .map(|s| {
            Arc::new(RemoteHealthSource::new(
                s.name.clone(),
                s.endpoint.clone(),
                client.clone(),
                retry.clone(),
            )) as Arc<dyn HealthSource>
        })
        .collect();

    let poller = Arc::new(HealthPoller::new(
        sources,
        config.health.interval(),
        Some(collector),
    ));

    let poller_task = if config.health.enabled {
        Some(tokio::spawn(poller.clone().run()))
    } else {
        info!("health polling disabled by configuration");
        None
    };

    let reporter = Arc::new(HealthReporter::new(&config));
    let handler = RequestHandler::new(
        poller.clone(),
        reporter,
        metrics_registry,
        config.server.metrics_path.clone(),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Starting health monitor on {}", addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(
        ServerBuilder::new(addr)
            .with_handler(handler)
            .serve(shutdown_rx),
    );

    shutdown_signal().await;

    poller.shutdown();
    let _ = shutdown_tx.send(true);
    if let Some(task) = poller_task {
        let _ = task.await;
    }
    server.await??;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
