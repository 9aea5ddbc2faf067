//! Synthetic health checks through the relay's public endpoint
//!
//! Everything the monitor knows comes from driving requests through the
//! inbound interface, the same way any client would.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sysinfo::System;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::StatusServerConfig;
use crate::error::{RelayError, Result};
use crate::models::{CheckOutcome, EndpointCheck, HistoryEntry, StatusSnapshot};

/// Fixed targets exercised through the relay on every check round.
const SYNTHETIC_TARGETS: &[(&str, &str)] = &[
    ("HTTP echo", "http://httpbin.org/ip"),
    ("HTTPS echo", "https://httpbin.org/ip"),
    ("Example page", "https://www.example.com"),
];

const HISTORY_LIMIT: usize = 20;

#[derive(Default)]
struct MonitorState {
    relay_running: bool,
    last_check: Option<DateTime<Utc>>,
    test_results: Vec<EndpointCheck>,
    history: Vec<HistoryEntry>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
}

pub struct StatusMonitor {
    relay_addr: String,
    check_interval: Duration,
    client: reqwest::Client,
    state: RwLock<MonitorState>,
    started_at: DateTime<Utc>,
}

impl StatusMonitor {
    pub fn new(relay_addr: String, config: &StatusServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout))
            .no_proxy()
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build status client: {}", e)))?;

        Ok(Self {
            relay_addr,
            check_interval: Duration::from_secs(config.check_interval),
            client,
            state: RwLock::new(MonitorState::default()),
            started_at: Utc::now(),
        })
    }

    /// Run the monitor loop (call in a spawned task)
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting status monitor with {}s interval",
            self.check_interval.as_secs()
        );

        let mut tick = interval(self.check_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.check_round().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Status monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One complete check round against the public relay endpoint.
    pub async fn check_round(&self) {
        let relay_running = self.relay_reachable().await;

        let mut results = Vec::new();
        if relay_running {
            for (name, target) in SYNTHETIC_TARGETS {
                results.push(self.check_target(name, target).await);
            }
        } else {
            warn!(
                "Relay endpoint {} is not accepting connections",
                self.relay_addr
            );
        }

        self.record_round(relay_running, results);
    }

    async fn relay_reachable(&self) -> bool {
        matches!(
            timeout(Duration::from_secs(2), TcpStream::connect(&self.relay_addr)).await,
            Ok(Ok(_))
        )
    }

    /// Drive one synthetic request for `target` through the relay.
    async fn check_target(&self, name: &str, target: &str) -> EndpointCheck {
        let via_relay = format!("http://{}/{}", self.relay_addr, target);
        let started = Instant::now();

        match self.client.get(&via_relay).send().await {
            Ok(response) => {
                let status = response.status();
                let content_length = response.bytes().await.map(|b| b.len()).unwrap_or(0);
                let response_time_ms = started.elapsed().as_millis() as u64;

                if status.is_success() {
                    EndpointCheck {
                        name: name.to_string(),
                        url: target.to_string(),
                        outcome: CheckOutcome::Success,
                        status_code: Some(status.as_u16()),
                        response_time_ms: Some(response_time_ms),
                        content_length: Some(content_length),
                        error: None,
                        timestamp: Utc::now(),
                    }
                } else {
                    EndpointCheck {
                        name: name.to_string(),
                        url: target.to_string(),
                        outcome: CheckOutcome::HttpError,
                        status_code: Some(status.as_u16()),
                        response_time_ms: Some(response_time_ms),
                        content_length: None,
                        error: Some(format!("HTTP {}", status)),
                        timestamp: Utc::now(),
                    }
                }
            }
            Err(e) => {
                debug!("Synthetic check {} failed: {}", name, e);
                EndpointCheck {
                    name: name.to_string(),
                    url: target.to_string(),
                    outcome: CheckOutcome::Error,
                    status_code: None,
                    response_time_ms: None,
                    content_length: None,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }

    /// Fold one round into the running counters and bounded history.
    fn record_round(&self, relay_running: bool, results: Vec<EndpointCheck>) {
        let successful_tests = results
            .iter()
            .filter(|r| r.outcome == CheckOutcome::Success)
            .count();

        let mut state = self.state.write();
        state.relay_running = relay_running;
        state.last_check = Some(Utc::now());

        for result in &results {
            state.total_requests += 1;
            if result.outcome == CheckOutcome::Success {
                state.successful_requests += 1;
            } else {
                state.failed_requests += 1;
            }
        }

        state.history.push(HistoryEntry {
            timestamp: Utc::now(),
            relay_running,
            successful_tests,
            total_tests: results.len(),
        });
        if state.history.len() > HISTORY_LIMIT {
            let excess = state.history.len() - HISTORY_LIMIT;
            state.history.drain(..excess);
        }

        state.test_results = results;
    }

    /// Read-only snapshot for the status API.
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.read();

        let times: Vec<u64> = state
            .test_results
            .iter()
            .filter_map(|r| r.response_time_ms)
            .collect();
        let average_response_time_ms = if times.is_empty() {
            0
        } else {
            times.iter().sum::<u64>() / times.len() as u64
        };

        StatusSnapshot {
            relay_running: state.relay_running,
            last_check: state.last_check,
            test_results: state.test_results.clone(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            average_response_time_ms,
            load_average: System::load_average().one,
            history: state.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> StatusMonitor {
        let config = StatusServerConfig {
            port: 8888,
            host: "127.0.0.1".to_string(),
            check_interval: 60,
            probe_timeout: 15,
        };
        StatusMonitor::new("127.0.0.1:8080".to_string(), &config).unwrap()
    }

    fn check(outcome: CheckOutcome, response_time_ms: Option<u64>) -> EndpointCheck {
        EndpointCheck {
            name: "test".to_string(),
            url: "http://httpbin.org/ip".to_string(),
            outcome,
            status_code: None,
            response_time_ms,
            content_length: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_record_round_updates_counters() {
        let monitor = monitor();
        monitor.record_round(
            true,
            vec![
                check(CheckOutcome::Success, Some(100)),
                check(CheckOutcome::Success, Some(300)),
                check(CheckOutcome::Error, None),
            ],
        );

        let snapshot = monitor.snapshot();
        assert!(snapshot.relay_running);
        assert!(snapshot.last_check.is_some());
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.average_response_time_ms, 200);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].successful_tests, 2);
        assert_eq!(snapshot.history[0].total_tests, 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let monitor = monitor();
        for _ in 0..30 {
            monitor.record_round(true, vec![check(CheckOutcome::Success, Some(10))]);
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.history.len(), HISTORY_LIMIT);
        // Counters keep accumulating past the history window.
        assert_eq!(snapshot.total_requests, 30);
    }

    #[test]
    fn test_empty_round_when_relay_down() {
        let monitor = monitor();
        monitor.record_round(false, Vec::new());

        let snapshot = monitor.snapshot();
        assert!(!snapshot.relay_running);
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.average_response_time_ms, 0);
        assert_eq!(snapshot.history[0].total_tests, 0);
    }
}
