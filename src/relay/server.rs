//! Relay server implementation using hyper
//!
//! Accepts inbound relay requests and serves each connection on its own task.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::config::RelayServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::engine::ForwardingEngine;
use crate::relay::handler::RelayHandler;

/// Relay server
pub struct RelayServer {
    config: RelayServerConfig,
    handler: Arc<RelayHandler>,
}

impl RelayServer {
    /// Create a new relay server
    pub fn new(config: RelayServerConfig, engine: Arc<ForwardingEngine>) -> Self {
        let handler = Arc::new(RelayHandler::new(
            engine,
            Duration::from_secs(config.request_delay),
        ));

        Self { config, handler }
    }

    /// Run the relay server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| RelayError::InvalidConfig("invalid relay listen address".into()))?;

        let listener = TcpListener::bind(addr).await?;
        info!("Relay server listening on {}", addr);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, client_addr)) => {
                            let handler = self.handler.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(
                                    stream,
                                    client_addr,
                                    handler,
                                ).await {
                                    debug!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Relay server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a single connection
    async fn handle_connection(
        stream: tokio::net::TcpStream,
        client_addr: SocketAddr,
        handler: Arc<RelayHandler>,
    ) -> Result<()> {
        let io = TokioIo::new(stream);
        let client_ip = client_addr.ip().to_string();

        let service = service_fn(move |req: Request<Incoming>| {
            let handler = handler.clone();
            let client_ip = client_ip.clone();

            async move {
                match handler.handle(req, client_ip).await {
                    Ok(response) => Ok::<_, Infallible>(response),
                    Err(e) => {
                        error!("Request handling error: {}", e);
                        Ok(Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Full::new(Bytes::from(format!("Error: {}", e))))
                            .unwrap())
                    }
                }
            }
        });

        http1::Builder::new()
            .preserve_header_case(true)
            .title_case_headers(true)
            .serve_connection(io, service)
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        Ok(())
    }
}
