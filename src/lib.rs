//! Detour - Forwarding HTTP Relay
//!
//! A forward HTTP/HTTPS relay that routes requests through a rotating pool of
//! third-party upstream proxies.
//!
//! ## Features
//!
//! - Target URL embedded directly in the inbound request path
//! - Rotating proxy pool fetched from a public listing service
//! - Pass/fail validation of candidates, with an untested fallback when
//!   nothing passes
//! - Per-request retry with re-pick and direct-connection fallback
//! - Periodic background refresh, independent of request traffic
//! - Status monitor that exercises the relay through its public endpoint

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod relay;
pub mod status;

pub use config::Config;
pub use error::{RelayError, Result};
