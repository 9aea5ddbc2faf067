//! Models for the read-only status snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How one synthetic check through the relay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// 2xx response came back through the relay
    Success,
    /// The relay answered with an HTTP error status
    HttpError,
    /// The check never produced an HTTP response
    Error,
}

/// Outcome of one synthetic check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCheck {
    pub name: String,
    pub url: String,
    pub outcome: CheckOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One entry in the bounded check history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub relay_running: bool,
    pub successful_tests: usize,
    pub total_tests: usize,
}

/// Read-only snapshot served by the status API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub relay_running: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub test_results: Vec<EndpointCheck>,
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: u64,
    pub load_average: f64,
    pub history: Vec<HistoryEntry>,
}
