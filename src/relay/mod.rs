//! Forward relay
//!
//! This module provides the relay itself:
//! - TCP accept loop and per-connection HTTP serving
//! - Request handling (target extraction, identity headers, response re-emission)
//! - The forwarding engine with its retry and direct-fallback logic
//! - The outbound-call abstraction the engine retries over

pub mod engine;
pub mod handler;
pub mod outbound;
pub mod server;

pub use engine::{ForwardReport, ForwardingEngine};
pub use handler::RelayHandler;
pub use outbound::{HttpOutbound, Outbound, UpstreamResponse};
pub use server::RelayServer;
