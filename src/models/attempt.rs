//! Request-scoped records for the forwarding engine
//!
//! Nothing in this module outlives the inbound request it was created for.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method};
use url::Url;
use uuid::Uuid;

use super::endpoint::ProxyEndpoint;
use crate::error::OutboundError;

/// Route chosen for one forward attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Through an upstream proxy
    Proxy(ProxyEndpoint),
    /// No proxy at all
    Direct,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Proxy(endpoint) => write!(f, "{}", endpoint),
            Route::Direct => write!(f, "direct"),
        }
    }
}

/// Outcome of one forward attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The upstream produced an HTTP response, whatever the status.
    Responded { status: u16 },
    /// The attempt died at the transport level.
    Failed { error: OutboundError },
}

/// Transient record of a single forward attempt
#[derive(Debug, Clone)]
pub struct ForwardAttempt {
    pub target: String,
    pub route: Route,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Inbound request context: normalized target URL plus the outbound header
/// set, including the rotated client identity.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: Uuid,
    pub method: Method,
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestContext {
    pub fn new(method: Method, target: Url, headers: HeaderMap) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            target,
            headers,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }
}
