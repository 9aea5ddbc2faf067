//! Endpoint validation probe

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::PoolConfig;
use crate::models::ProxyEndpoint;

/// Result of probing one endpoint. Produced and consumed within a single
/// refresh cycle; never stored.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub endpoint: ProxyEndpoint,
    pub usable: bool,
}

/// Pass/fail probe for a candidate endpoint.
#[async_trait]
pub trait ProxyValidator: Send + Sync {
    /// Probe `endpoint` against the test target. `true` strictly means an
    /// HTTP 200 arrived through the proxy within the timeout; every failure
    /// mode collapses to `false` and nothing propagates.
    async fn validate(&self, endpoint: &ProxyEndpoint) -> bool;
}

/// Probes an endpoint by requesting a fixed echo target through it.
pub struct HttpValidator {
    test_url: String,
    timeout: Duration,
}

impl HttpValidator {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            test_url: config.validation_url.clone(),
            timeout: Duration::from_secs(config.validation_timeout),
        }
    }

    async fn probe(&self, endpoint: &ProxyEndpoint) -> reqwest::Result<bool> {
        let proxy = reqwest::Proxy::all(endpoint.url())?;
        // Probes are one-offs through ever-changing upstreams; keep no
        // idle connections around.
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()?;

        let response = client.get(&self.test_url).send().await?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }
}

#[async_trait]
impl ProxyValidator for HttpValidator {
    async fn validate(&self, endpoint: &ProxyEndpoint) -> bool {
        match self.probe(endpoint).await {
            Ok(usable) => {
                if !usable {
                    debug!("Proxy {} answered with a non-200 status", endpoint);
                }
                usable
            }
            Err(e) => {
                debug!("Probe through {} failed: {}", endpoint, e);
                false
            }
        }
    }
}
