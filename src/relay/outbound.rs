//! Outbound attempt execution
//!
//! One call = one complete try at the target, either through an upstream
//! proxy or direct. Every transport failure collapses into the closed
//! `OutboundError` kinds; a received HTTP response of any status is a success.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::config::RelayServerConfig;
use crate::error::{OutboundError, RelayError, Result};
use crate::models::{RequestContext, Route};

/// Response received from the upstream, buffered in full.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Executes one forward attempt over a chosen route.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn execute(
        &self,
        route: &Route,
        ctx: &RequestContext,
    ) -> std::result::Result<UpstreamResponse, OutboundError>;
}

/// reqwest-backed outbound executor.
pub struct HttpOutbound {
    timeout: Duration,
    direct: reqwest::Client,
}

impl HttpOutbound {
    pub fn new(config: &RelayServerConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.attempt_timeout);
        let direct = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build outbound client: {}", e)))?;

        Ok(Self { timeout, direct })
    }

    /// Clients are proxy-scoped in reqwest, so each proxied attempt gets a
    /// throwaway client routed through its endpoint.
    fn proxied_client(&self, proxy_url: &str) -> std::result::Result<reqwest::Client, OutboundError> {
        let proxy =
            reqwest::Proxy::all(proxy_url).map_err(|e| OutboundError::Other(e.to_string()))?;
        reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| OutboundError::Other(e.to_string()))
    }
}

#[async_trait]
impl Outbound for HttpOutbound {
    async fn execute(
        &self,
        route: &Route,
        ctx: &RequestContext,
    ) -> std::result::Result<UpstreamResponse, OutboundError> {
        let client = match route {
            Route::Direct => self.direct.clone(),
            Route::Proxy(endpoint) => self.proxied_client(&endpoint.url())?,
        };

        let mut request = client
            .request(ctx.method.clone(), ctx.target.clone())
            .headers(ctx.headers.clone());
        if let Some(body) = &ctx.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
