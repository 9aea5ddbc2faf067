//! Periodic pool refresh
//!
//! Fetches candidates, validates a bounded sample, and swaps the pool. The
//! refresher favors availability over purity: a failed fetch keeps the stale
//! pool, and a validation washout falls back to untested candidates.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{info, instrument, warn};

use crate::config::PoolConfig;
use crate::pool::{ProxyPool, ProxySource, ProxyValidator, ValidationResult};

pub struct PoolRefresher {
    pool: Arc<ProxyPool>,
    source: Arc<dyn ProxySource>,
    validator: Arc<dyn ProxyValidator>,
    interval: Duration,
    validation_sample: usize,
    fallback_sample: usize,
    validation_workers: usize,
}

impl PoolRefresher {
    pub fn new(
        pool: Arc<ProxyPool>,
        source: Arc<dyn ProxySource>,
        validator: Arc<dyn ProxyValidator>,
        config: &PoolConfig,
    ) -> Self {
        Self {
            pool,
            source,
            validator,
            interval: Duration::from_secs(config.refresh_interval),
            validation_sample: config.validation_sample,
            fallback_sample: config.fallback_sample,
            validation_workers: config.validation_workers,
        }
    }

    /// Run the refresh loop (call in a spawned task).
    ///
    /// The startup refresh is expected to have run synchronously already, so
    /// the first tick fires one full interval in. A failed refresh is never
    /// retried early; the timer is the only cadence.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting pool refresher with {}s interval",
            self.interval.as_secs()
        );

        let mut tick = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    info!("Refreshing proxy pool");
                    self.refresh_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Pool refresher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One complete refresh attempt. Never fails the caller.
    pub async fn refresh_once(&self) {
        let candidates = self.source.fetch().await;

        if candidates.is_empty() {
            if self.pool.is_seeded() {
                warn!(
                    "Listing fetch produced no candidates, keeping existing pool of {}",
                    self.pool.size()
                );
            } else {
                // First-ever population: record the degraded start.
                self.pool.replace(Vec::new());
            }
            return;
        }

        let sample: Vec<_> = candidates
            .iter()
            .take(self.validation_sample)
            .cloned()
            .collect();
        info!(
            "Validating {} of {} fetched candidates",
            sample.len(),
            candidates.len()
        );

        let results: Vec<ValidationResult> = futures::stream::iter(sample)
            .map(|endpoint| {
                let validator = self.validator.clone();
                async move {
                    let usable = validator.validate(&endpoint).await;
                    ValidationResult { endpoint, usable }
                }
            })
            .buffer_unordered(self.validation_workers.max(1))
            .collect()
            .await;

        let tested = results.len();
        let passing: Vec<_> = results
            .into_iter()
            .filter(|result| result.usable)
            .map(|result| result.endpoint)
            .collect();

        if !passing.is_empty() {
            info!("{} of {} tested proxies passed validation", passing.len(), tested);
            self.pool.replace(passing);
        } else {
            // Candidates exist but none passed; an untested pool still beats
            // an empty one.
            let fallback: Vec<_> = candidates.into_iter().take(self.fallback_sample).collect();
            warn!(
                "No proxies passed validation, keeping {} untested candidates as fallback",
                fallback.len()
            );
            self.pool.replace(fallback);
        }
    }
}

/// Guard for managing refresher lifecycle
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl RefresherHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for RefresherHandle {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::{ProxyEndpoint, ProxyScheme};

    fn endpoints(count: usize) -> Vec<ProxyEndpoint> {
        (0..count)
            .map(|i| ProxyEndpoint::new(ProxyScheme::Http, format!("10.0.0.{}", i + 1), 8080))
            .collect()
    }

    fn test_config() -> PoolConfig {
        PoolConfig {
            source_url: "http://listing.invalid/proxies".to_string(),
            fetch_timeout: 30,
            refresh_interval: 1800,
            validation_url: "http://echo.invalid/ip".to_string(),
            validation_timeout: 10,
            validation_sample: 100,
            fallback_sample: 50,
            validation_workers: 4,
        }
    }

    struct ScriptedSource {
        candidates: Vec<ProxyEndpoint>,
    }

    #[async_trait]
    impl ProxySource for ScriptedSource {
        async fn fetch(&self) -> Vec<ProxyEndpoint> {
            self.candidates.clone()
        }
    }

    /// Passes exactly the endpoints in `usable`, counting every probe.
    struct ScriptedValidator {
        usable: Vec<ProxyEndpoint>,
        probes: AtomicUsize,
    }

    impl ScriptedValidator {
        fn new(usable: Vec<ProxyEndpoint>) -> Self {
            Self {
                usable,
                probes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProxyValidator for ScriptedValidator {
        async fn validate(&self, endpoint: &ProxyEndpoint) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.usable.contains(endpoint)
        }
    }

    fn refresher(
        pool: Arc<ProxyPool>,
        candidates: Vec<ProxyEndpoint>,
        validator: Arc<ScriptedValidator>,
        config: &PoolConfig,
    ) -> PoolRefresher {
        PoolRefresher::new(pool, Arc::new(ScriptedSource { candidates }), validator, config)
    }

    #[tokio::test]
    async fn test_refresh_keeps_validated_endpoints_only() {
        let pool = Arc::new(ProxyPool::new());
        let candidates = endpoints(10);
        let usable = candidates[..3].to_vec();
        let validator = Arc::new(ScriptedValidator::new(usable.clone()));

        refresher(pool.clone(), candidates, validator, &test_config())
            .refresh_once()
            .await;

        assert_eq!(pool.size(), 3);
        for _ in 0..20 {
            assert!(usable.contains(&pool.pick().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_existing_pool() {
        let pool = Arc::new(ProxyPool::new());
        pool.replace(endpoints(5));
        let validator = Arc::new(ScriptedValidator::new(Vec::new()));

        refresher(pool.clone(), Vec::new(), validator.clone(), &test_config())
            .refresh_once()
            .await;

        assert_eq!(pool.size(), 5);
        assert_eq!(validator.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_fetch_at_startup_seeds_empty_pool() {
        let pool = Arc::new(ProxyPool::new());
        let validator = Arc::new(ScriptedValidator::new(Vec::new()));

        refresher(pool.clone(), Vec::new(), validator, &test_config())
            .refresh_once()
            .await;

        assert!(pool.is_seeded());
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn test_validation_washout_falls_back_to_untested_candidates() {
        let pool = Arc::new(ProxyPool::new());
        let candidates = endpoints(20);
        let validator = Arc::new(ScriptedValidator::new(Vec::new()));

        refresher(pool.clone(), candidates.clone(), validator.clone(), &test_config())
            .refresh_once()
            .await;

        // All 20 were probed and none passed, so the pool holds the first 50
        // candidates untested, bounded by what was available.
        assert_eq!(validator.probes.load(Ordering::SeqCst), 20);
        assert_eq!(pool.size(), 20);
        assert!(candidates.contains(&pool.pick().unwrap()));
    }

    #[tokio::test]
    async fn test_fallback_is_bounded_by_fallback_sample() {
        let pool = Arc::new(ProxyPool::new());
        let candidates = endpoints(80);
        let validator = Arc::new(ScriptedValidator::new(Vec::new()));
        let mut config = test_config();
        config.fallback_sample = 50;

        refresher(pool.clone(), candidates.clone(), validator, &config)
            .refresh_once()
            .await;

        assert_eq!(pool.size(), 50);
        for _ in 0..20 {
            // Fallback is a prefix of the fetched candidate order.
            assert!(candidates[..50].contains(&pool.pick().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_validation_sample_caps_probe_count() {
        let pool = Arc::new(ProxyPool::new());
        let candidates = endpoints(120);
        let validator = Arc::new(ScriptedValidator::new(candidates.clone()));
        let mut config = test_config();
        config.validation_sample = 100;

        refresher(pool.clone(), candidates, validator.clone(), &config)
            .refresh_once()
            .await;

        assert_eq!(validator.probes.load(Ordering::SeqCst), 100);
        assert_eq!(pool.size(), 100);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let pool = Arc::new(ProxyPool::new());
        let validator = Arc::new(ScriptedValidator::new(Vec::new()));
        let refresher = Arc::new(refresher(pool, Vec::new(), validator, &test_config()));

        let (handle, shutdown_rx) = RefresherHandle::new();
        let task = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.run(shutdown_rx).await })
        };

        handle.shutdown();
        task.await.unwrap();
    }
}
