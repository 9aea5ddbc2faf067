//! Status API server using Axum
//!
//! Serves the read-only JSON snapshot produced by the status monitor.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use http::Method;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::StatusServerConfig;
use crate::error::{RelayError, Result};
use crate::models::StatusSnapshot;
use crate::status::monitor::StatusMonitor;

/// Shared state for status handlers
#[derive(Clone)]
pub struct StatusState {
    monitor: Arc<StatusMonitor>,
}

/// Status API server
pub struct StatusServer {
    config: StatusServerConfig,
    state: StatusState,
}

impl StatusServer {
    pub fn new(config: StatusServerConfig, monitor: Arc<StatusMonitor>) -> Self {
        Self {
            config,
            state: StatusState { monitor },
        }
    }

    /// Build the router
    fn build_router(&self) -> Router {
        // The snapshot is public and read-only; no credentials are involved.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET]);

        Router::new()
            .route("/api/status", get(get_status))
            .route("/api/check", get(trigger_check))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
    }

    /// Run the status server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| RelayError::InvalidConfig("invalid status listen address".into()))?;

        let router = self.build_router();

        info!("Status server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| RelayError::Internal(e.to_string()))?;

        info!("Status server shut down");
        Ok(())
    }
}

/// Current snapshot of relay health as seen from the outside
async fn get_status(State(state): State<StatusState>) -> Json<StatusSnapshot> {
    Json(state.monitor.snapshot())
}

/// Kick off an immediate check round without waiting for the timer
async fn trigger_check(State(state): State<StatusState>) -> Json<serde_json::Value> {
    let monitor = state.monitor.clone();
    tokio::spawn(async move {
        monitor.check_round().await;
    });

    Json(serde_json::json!({ "message": "status check initiated" }))
}
