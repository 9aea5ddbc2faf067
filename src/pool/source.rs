//! Candidate fetch from the upstream listing service

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::PoolConfig;
use crate::error::{RelayError, Result};
use crate::models::ProxyEndpoint;

/// Browser-style User-Agent sent to the listing service; some providers
/// reject clients without one.
const LISTING_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Source of candidate upstream endpoints.
///
/// A source never fails its caller: any transport problem is reported as an
/// empty list, which the refresher treats as "keep the existing pool".
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch(&self) -> Vec<ProxyEndpoint>;
}

/// Fetches newline-delimited `host:port` entries from a listing URL.
pub struct ListingSource {
    url: String,
    client: reqwest::Client,
}

impl ListingSource {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout))
            .user_agent(LISTING_USER_AGENT)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build listing client: {}", e)))?;

        Ok(Self {
            url: config.source_url.clone(),
            client,
        })
    }

    async fn fetch_inner(&self) -> reqwest::Result<Vec<ProxyEndpoint>> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(parse_listing(&body))
    }
}

#[async_trait]
impl ProxySource for ListingSource {
    async fn fetch(&self) -> Vec<ProxyEndpoint> {
        match self.fetch_inner().await {
            Ok(endpoints) => {
                info!(
                    "Fetched {} candidate proxies from listing service",
                    endpoints.len()
                );
                endpoints
            }
            Err(e) => {
                error!("Failed to fetch proxy listing: {}", e);
                Vec::new()
            }
        }
    }
}

/// Parse a newline-delimited `host:port` listing. Malformed lines are
/// skipped silently.
pub fn parse_listing(body: &str) -> Vec<ProxyEndpoint> {
    body.lines()
        .filter_map(ProxyEndpoint::from_listing_line)
        .collect()
}
