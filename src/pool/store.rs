//! Shared pool of upstream proxy endpoints
//!
//! Single writer (the refresher), arbitrarily many concurrent readers.
//! Replacement swaps the whole snapshot at once; a reader observes either the
//! old set or the new one, never a mix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::models::ProxyEndpoint;

pub struct ProxyPool {
    endpoints: ArcSwap<Vec<ProxyEndpoint>>,
    seeded: AtomicBool,
}

impl ProxyPool {
    /// Create an empty pool. It stays empty until the first `replace`.
    pub fn new() -> Self {
        Self {
            endpoints: ArcSwap::from_pointee(Vec::new()),
            seeded: AtomicBool::new(false),
        }
    }

    /// One endpoint chosen uniformly at random from the current snapshot,
    /// or `None` while the pool is empty.
    pub fn pick(&self) -> Option<ProxyEndpoint> {
        let snapshot = self.endpoints.load();
        snapshot.choose(&mut rand::thread_rng()).cloned()
    }

    /// Swap the visible endpoint set wholesale.
    ///
    /// An empty set is ignored once the pool has been populated: stale
    /// endpoints beat no endpoints. The first-ever population may be empty;
    /// that is accepted and logged as a degraded start.
    pub fn replace(&self, new_endpoints: Vec<ProxyEndpoint>) {
        if new_endpoints.is_empty() {
            if self.seeded.swap(true, Ordering::SeqCst) {
                info!(
                    "Ignoring empty pool replacement, keeping {} endpoints",
                    self.size()
                );
            } else {
                warn!("Pool seeded empty; requests will fall back to direct connections");
            }
            return;
        }

        let count = new_endpoints.len();
        self.seeded.store(true, Ordering::SeqCst);
        self.endpoints.store(Arc::new(new_endpoints));
        info!("Pool replaced with {} endpoints", count);
    }

    pub fn size(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether any replacement, even an empty first one, has been applied.
    pub fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::SeqCst)
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new()
    }
}
