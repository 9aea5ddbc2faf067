//! Forwarding engine with retry and direct fallback
//!
//! Each attempt re-picks from the pool, so consecutive attempts may ride
//! different upstreams; an empty pool routes the attempt direct. Any received
//! HTTP response ends the loop, whatever its status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use http::StatusCode;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::RelayServerConfig;
use crate::error::OutboundError;
use crate::models::{AttemptOutcome, ForwardAttempt, RequestContext, Route};
use crate::pool::ProxyPool;
use crate::relay::outbound::{Outbound, UpstreamResponse};

/// Result of a complete forward call: the verbatim upstream response, or the
/// last transport error once every attempt failed, plus one record per
/// attempt made.
pub struct ForwardReport {
    pub outcome: std::result::Result<UpstreamResponse, OutboundError>,
    pub attempts: Vec<ForwardAttempt>,
}

impl ForwardReport {
    /// Status surfaced to the relay client.
    pub fn terminal_status(&self) -> StatusCode {
        match &self.outcome {
            Ok(response) => response.status,
            Err(error) => error.terminal_status(),
        }
    }
}

pub struct ForwardingEngine {
    pool: Arc<ProxyPool>,
    outbound: Arc<dyn Outbound>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl ForwardingEngine {
    pub fn new(
        pool: Arc<ProxyPool>,
        outbound: Arc<dyn Outbound>,
        config: &RelayServerConfig,
    ) -> Self {
        Self {
            pool,
            outbound,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_secs(config.retry_backoff),
        }
    }

    /// Forward one inbound request to its target.
    pub async fn forward(&self, ctx: &RequestContext) -> ForwardReport {
        let mut attempts = Vec::new();
        let mut last_error = OutboundError::Other("no forward attempts were made".to_string());

        for attempt in 1..=self.max_attempts {
            let route = match self.pool.pick() {
                Some(endpoint) => Route::Proxy(endpoint),
                None => Route::Direct,
            };

            debug!(
                request_id = %ctx.id,
                "Attempt {}/{} for {} via {}",
                attempt, self.max_attempts, ctx.target, route
            );

            let started = Instant::now();
            match self.outbound.execute(&route, ctx).await {
                Ok(response) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(
                        request_id = %ctx.id,
                        "Forwarded {} via {} with status {} in {}ms",
                        ctx.target, route, response.status, elapsed_ms
                    );
                    attempts.push(ForwardAttempt {
                        target: ctx.target.to_string(),
                        route,
                        attempt,
                        outcome: AttemptOutcome::Responded {
                            status: response.status.as_u16(),
                        },
                        elapsed_ms,
                        timestamp: Utc::now(),
                    });
                    return ForwardReport {
                        outcome: Ok(response),
                        attempts,
                    };
                }
                Err(err) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        request_id = %ctx.id,
                        "Attempt {}/{} for {} via {} failed: {}",
                        attempt, self.max_attempts, ctx.target, route, err
                    );
                    attempts.push(ForwardAttempt {
                        target: ctx.target.to_string(),
                        route,
                        attempt,
                        outcome: AttemptOutcome::Failed { error: err.clone() },
                        elapsed_ms,
                        timestamp: Utc::now(),
                    });
                    last_error = err;

                    if attempt < self.max_attempts {
                        sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        error!(
            request_id = %ctx.id,
            "All {} attempts for {} failed: {}",
            self.max_attempts, ctx.target, last_error
        );
        ForwardReport {
            outcome: Err(last_error),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{HeaderMap, Method};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use url::Url;

    use crate::models::{ProxyEndpoint, ProxyScheme};

    fn test_config(max_attempts: u32) -> RelayServerConfig {
        RelayServerConfig {
            port: 8080,
            host: "127.0.0.1".to_string(),
            max_attempts,
            attempt_timeout: 30,
            request_delay: 1,
            retry_backoff: 1,
        }
    }

    fn context(target: &str) -> RequestContext {
        RequestContext::new(Method::GET, Url::parse(target).unwrap(), HeaderMap::new())
    }

    fn response(status: u16, body: &'static [u8]) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body),
        }
    }

    /// Plays back scripted outcomes and records the route of every attempt.
    struct ScriptedOutbound {
        script: Mutex<VecDeque<std::result::Result<UpstreamResponse, OutboundError>>>,
        routes: Mutex<Vec<Route>>,
    }

    impl ScriptedOutbound {
        fn new(
            script: Vec<std::result::Result<UpstreamResponse, OutboundError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                routes: Mutex::new(Vec::new()),
            })
        }

        fn routes(&self) -> Vec<Route> {
            self.routes.lock().clone()
        }
    }

    #[async_trait]
    impl Outbound for ScriptedOutbound {
        async fn execute(
            &self,
            route: &Route,
            _ctx: &RequestContext,
        ) -> std::result::Result<UpstreamResponse, OutboundError> {
            self.routes.lock().push(route.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or(Err(OutboundError::Other("script exhausted".to_string())))
        }
    }

    fn populated_pool(count: usize) -> Arc<ProxyPool> {
        let pool = Arc::new(ProxyPool::new());
        pool.replace(
            (0..count)
                .map(|i| ProxyEndpoint::new(ProxyScheme::Http, format!("10.0.0.{}", i + 1), 8080))
                .collect(),
        );
        pool
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let outbound = ScriptedOutbound::new(vec![Ok(response(200, b"1.2.3.4"))]);
        let engine = ForwardingEngine::new(populated_pool(3), outbound.clone(), &test_config(3));

        let report = engine.forward(&context("http://example.com/")).await;

        let upstream = report.outcome.unwrap();
        assert_eq!(upstream.status, StatusCode::OK);
        assert_eq!(&upstream.body[..], b"1.2.3.4");
        assert_eq!(report.attempts.len(), 1);
        assert!(matches!(
            report.attempts[0].outcome,
            AttemptOutcome::Responded { status: 200 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let outbound = ScriptedOutbound::new(vec![
            Err(OutboundError::Connect("refused".to_string())),
            Err(OutboundError::Timeout),
            Ok(response(200, b"1.2.3.4")),
        ]);
        let engine = ForwardingEngine::new(populated_pool(3), outbound.clone(), &test_config(3));

        let report = engine.forward(&context("http://example.com/")).await;

        let upstream = report.outcome.unwrap();
        assert_eq!(upstream.status, StatusCode::OK);
        assert_eq!(&upstream.body[..], b"1.2.3.4");
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(report.attempts[2].attempt, 3);
        assert!(matches!(
            report.attempts[2].outcome,
            AttemptOutcome::Responded { status: 200 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_http_error_is_not_retried() {
        let outbound = ScriptedOutbound::new(vec![Ok(response(404, b"not found"))]);
        let engine = ForwardingEngine::new(populated_pool(3), outbound.clone(), &test_config(3));

        let report = engine.forward(&context("http://example.com/missing")).await;

        // A received HTTP error is a valid forwarded response, passed back
        // verbatim on the attempt that received it.
        let upstream = report.outcome.unwrap();
        assert_eq!(upstream.status, StatusCode::NOT_FOUND);
        assert_eq!(&upstream.body[..], b"not found");
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(outbound.routes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_surface_gateway_timeout() {
        let outbound = ScriptedOutbound::new(vec![
            Err(OutboundError::Timeout),
            Err(OutboundError::Connect("refused".to_string())),
            Err(OutboundError::Timeout),
        ]);
        let engine = ForwardingEngine::new(populated_pool(3), outbound.clone(), &test_config(3));

        let report = engine.forward(&context("http://example.com/")).await;

        assert!(report.outcome.is_err());
        assert_eq!(report.terminal_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(report.attempts.len(), 3);
        assert!(report
            .attempts
            .iter()
            .all(|a| matches!(a.outcome, AttemptOutcome::Failed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_failure_surfaces_internal_error() {
        let outbound = ScriptedOutbound::new(vec![
            Err(OutboundError::Other("bad body".to_string())),
            Err(OutboundError::Other("bad body".to_string())),
            Err(OutboundError::Other("bad body".to_string())),
        ]);
        let engine = ForwardingEngine::new(populated_pool(1), outbound, &test_config(3));

        let report = engine.forward(&context("http://example.com/")).await;

        assert_eq!(report.terminal_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_goes_direct() {
        let outbound = ScriptedOutbound::new(vec![Ok(response(200, b"ok"))]);
        let pool = Arc::new(ProxyPool::new());
        let engine = ForwardingEngine::new(pool, outbound.clone(), &test_config(3));

        let report = engine.forward(&context("http://example.com/")).await;

        assert!(report.outcome.is_ok());
        assert_eq!(outbound.routes(), vec![Route::Direct]);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.route == Route::Direct));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_repicks_route() {
        let outbound = ScriptedOutbound::new(vec![
            Err(OutboundError::Timeout),
            Err(OutboundError::Timeout),
            Err(OutboundError::Timeout),
        ]);
        let engine = ForwardingEngine::new(populated_pool(5), outbound.clone(), &test_config(3));

        let _ = engine.forward(&context("http://example.com/")).await;

        // No affinity: every attempt drew from the pool on its own.
        let routes = outbound.routes();
        assert_eq!(routes.len(), 3);
        assert!(routes.iter().all(|r| matches!(r, Route::Proxy(_))));
    }
}
