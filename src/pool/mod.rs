//! Proxy pool lifecycle
//!
//! This module provides the pool of upstream endpoints and everything that
//! keeps it fresh:
//! - Fetching candidates from the listing service
//! - Validating candidates against an echo target
//! - The shared pool itself, with atomic snapshot replacement
//! - The background refresher tying the three together

pub mod refresher;
pub mod source;
pub mod store;
pub mod validator;

pub use refresher::{PoolRefresher, RefresherHandle};
pub use source::{ListingSource, ProxySource};
pub use store::ProxyPool;
pub use validator::{HttpValidator, ProxyValidator, ValidationResult};
