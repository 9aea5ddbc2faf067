//! Relay request handler
//!
//! The inbound path, stripped of its leading slash, is the target URL.
//! Responses come back byte-for-byte, minus transport-specific headers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode};
use rand::seq::SliceRandom;
use tokio::time::sleep;
use tracing::{instrument, warn};
use url::Url;

use crate::error::{RelayError, Result};
use crate::models::RequestContext;
use crate::relay::engine::ForwardingEngine;
use crate::relay::outbound::UpstreamResponse;

/// Client identity strings rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

/// Hosts assumed to be HTTPS-only when the inbound target carries no scheme.
/// A fixed allowlist for well-known hosts that reject plain HTTP, not a
/// general capability.
const HTTPS_ONLY_HOSTS: &[&str] = &["google", "github", "facebook", "twitter"];

pub struct RelayHandler {
    engine: Arc<ForwardingEngine>,
    request_delay: Duration,
}

impl RelayHandler {
    pub fn new(engine: Arc<ForwardingEngine>, request_delay: Duration) -> Self {
        Self {
            engine,
            request_delay,
        }
    }

    /// Handle one inbound relay request.
    #[instrument(skip(self, req), fields(method = %req.method(), path = %req.uri()))]
    pub async fn handle(
        &self,
        req: Request<Incoming>,
        client_ip: String,
    ) -> Result<Response<Full<Bytes>>> {
        let method = req.method().clone();
        if method != Method::GET && method != Method::POST {
            return Ok(error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "only GET and POST are relayed",
            ));
        }

        let raw_target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("");
        let raw_target = raw_target.strip_prefix('/').unwrap_or(raw_target);
        if raw_target.is_empty() {
            let err = RelayError::MissingTarget;
            return Ok(error_response(err.status_code(), &err.to_string()));
        }

        let target = match normalize_target(raw_target) {
            Ok(url) => url,
            Err(e) => {
                warn!("Rejecting target {:?} from {}: {}", raw_target, client_ip, e);
                return Ok(error_response(StatusCode::BAD_REQUEST, &e.to_string()));
            }
        };

        // Constant pacing toward upstream rate limits, before the first attempt.
        sleep(self.request_delay).await;

        let mut ctx = RequestContext::new(method.clone(), target, identity_headers());
        if method == Method::POST {
            let content_type = req.headers().get(CONTENT_TYPE).cloned();
            let body = req
                .into_body()
                .collect()
                .await
                .map_err(|e| RelayError::InvalidRequest(format!("failed to read body: {}", e)))?
                .to_bytes();
            if let Some(content_type) = content_type {
                ctx.headers.insert(CONTENT_TYPE, content_type);
            }
            if !body.is_empty() {
                ctx = ctx.with_body(body);
            }
        }

        let report = self.engine.forward(&ctx).await;
        match report.outcome {
            Ok(upstream) => Ok(emit_response(upstream)),
            Err(last) => {
                let err = RelayError::AttemptsExhausted {
                    attempts: report.attempts.len() as u32,
                    last,
                };
                Ok(error_response(err.status_code(), &err.to_string()))
            }
        }
    }
}

/// Build the rotated outbound identity header set.
fn identity_headers() -> http::HeaderMap {
    let agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);

    let mut headers = http::HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers
}

/// Normalize a path-embedded target into an absolute URL.
///
/// Targets without a scheme default to `http://`, unless the host matches
/// the HTTPS-only list, which gets `https://` instead.
pub fn normalize_target(raw: &str) -> Result<Url> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        let host = raw.split('/').next().unwrap_or(raw).to_ascii_lowercase();
        if HTTPS_ONLY_HOSTS.iter().any(|known| host.contains(known)) {
            format!("https://{}", raw)
        } else {
            format!("http://{}", raw)
        }
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| RelayError::InvalidTarget(format!("{}: {}", raw, e)))?;
    if url.host_str().is_none() {
        return Err(RelayError::InvalidTarget(format!("{}: missing host", raw)));
    }
    Ok(url)
}

/// Re-emit the upstream response, dropping transport-specific headers. The
/// body was already decoded and re-measured, so the content codings and
/// length of the upstream exchange no longer apply.
fn emit_response(upstream: UpstreamResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(upstream.status);
    for (name, value) in upstream.headers.iter() {
        if !is_transport_header(name.as_str()) {
            builder = builder.header(name, value);
        }
    }

    match builder.body(Full::new(upstream.body)) {
        Ok(response) => response,
        Err(_) => error_response(StatusCode::BAD_GATEWAY, "invalid upstream response"),
    }
}

/// Check if a header is transport-specific and should not be re-emitted
fn is_transport_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "content-encoding"
            | "content-length"
    )
}

/// Create an error response
fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}
