//! Detour Relay - Entry Point
//!
//! Starts the relay server, pool refresher, status monitor, and status API
//! with graceful shutdown support.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use detour::config::{Config, LogConfig};
use detour::pool::{HttpValidator, ListingSource, PoolRefresher, ProxyPool, RefresherHandle};
use detour::relay::{ForwardingEngine, HttpOutbound, RelayServer};
use detour::status::{StatusMonitor, StatusServer};

#[tokio::main]
async fn main() -> detour::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    init_tracing(&config.log);
    info!("Starting Detour relay");

    // Build the pool and its collaborators
    let pool = Arc::new(ProxyPool::new());
    let source = Arc::new(ListingSource::new(&config.pool)?);
    let validator = Arc::new(HttpValidator::new(&config.pool));
    let refresher = PoolRefresher::new(pool.clone(), source, validator, &config.pool);

    // Prime the pool before accepting traffic
    info!("Priming proxy pool");
    refresher.refresh_once().await;
    if pool.is_empty() {
        warn!("No proxies available at startup; requests will use direct connections");
    } else {
        info!("Loaded {} proxies", pool.size());
    }

    // Wire up the forwarding engine and servers
    let outbound = Arc::new(HttpOutbound::new(&config.relay)?);
    let engine = Arc::new(ForwardingEngine::new(pool.clone(), outbound, &config.relay));
    let relay_server = RelayServer::new(config.relay.clone(), engine);

    let monitor = Arc::new(StatusMonitor::new(
        format!("127.0.0.1:{}", config.relay.port),
        &config.status,
    )?);
    let status_server = StatusServer::new(config.status.clone(), monitor.clone());

    // Create shutdown channels
    let (shutdown_tx, _) = watch::channel(false);

    // Start the pool refresher
    let (refresher_handle, refresher_shutdown) = RefresherHandle::new();
    let refresher_task = tokio::spawn(async move {
        refresher.run(refresher_shutdown).await;
    });

    // Start the status monitor
    let monitor_shutdown = shutdown_tx.subscribe();
    let monitor_runner = monitor.clone();
    let monitor_task = tokio::spawn(async move {
        monitor_runner.run(monitor_shutdown).await;
    });

    // Start servers
    let relay_shutdown = shutdown_tx.subscribe();
    let status_shutdown = shutdown_tx.subscribe();

    let relay_task = tokio::spawn(async move {
        if let Err(e) = relay_server.run(relay_shutdown).await {
            error!("Relay server error: {}", e);
        }
    });

    let status_task = tokio::spawn(async move {
        if let Err(e) = status_server.run(status_shutdown).await {
            error!("Status server error: {}", e);
        }
    });

    info!(
        "Servers started - Relay: {}, Status: {}",
        config.relay_addr(),
        config.status_addr()
    );

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    // Send shutdown signal to all services
    let _ = shutdown_tx.send(true);
    refresher_handle.shutdown();

    // Wait for all tasks to complete
    let _ = tokio::join!(relay_task, status_task, monitor_task, refresher_task);

    info!("Detour relay stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("detour={},tower_http=debug", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
}
