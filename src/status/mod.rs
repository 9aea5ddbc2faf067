//! Status monitoring
//!
//! A background monitor drives synthetic requests through the relay's public
//! endpoint and a small axum server exposes the resulting snapshot as JSON.
//! The monitor deliberately knows nothing about the relay's internals.

pub mod monitor;
pub mod server;

pub use monitor::StatusMonitor;
pub use server::StatusServer;
