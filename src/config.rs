use crate::error::{RelayError, Result};
use std::env;
use url::Url;

/// Default listing service queried for candidate proxies.
const DEFAULT_SOURCE_URL: &str = "https://api.proxyscrape.com/v4/free-proxy-list/get?request=displayproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all&skip=0&limit=500";

/// Default echo endpoint a candidate must reach to count as usable.
const DEFAULT_VALIDATION_URL: &str = "http://httpbin.org/ip";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server configuration
    pub relay: RelayServerConfig,
    /// Proxy pool configuration
    pub pool: PoolConfig,
    /// Status server configuration
    pub status: StatusServerConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Port for the relay server (default: 8080)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Maximum forward attempts per inbound request
    pub max_attempts: u32,
    /// Per-attempt timeout in seconds
    pub attempt_timeout: u64,
    /// Fixed pacing delay before the first attempt, in seconds
    pub request_delay: u64,
    /// Fixed backoff between attempts, in seconds
    pub retry_backoff: u64,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Listing service URL returning newline-delimited `host:port` entries
    pub source_url: String,
    /// Listing fetch timeout in seconds
    pub fetch_timeout: u64,
    /// Seconds between refresh cycles
    pub refresh_interval: u64,
    /// Target a candidate must answer with HTTP 200 to pass validation
    pub validation_url: String,
    /// Per-candidate probe timeout in seconds
    pub validation_timeout: u64,
    /// Maximum number of candidates probed per refresh
    pub validation_sample: usize,
    /// Untested candidates kept when nothing passes validation
    pub fallback_sample: usize,
    /// Concurrent validation probes
    pub validation_workers: usize,
}

#[derive(Debug, Clone)]
pub struct StatusServerConfig {
    /// Port for the status API server (default: 8888)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Seconds between synthetic check rounds
    pub check_interval: u64,
    /// Timeout for one synthetic check, in seconds
    pub probe_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            relay: RelayServerConfig {
                port: get_env_or("RELAY_PORT", "8080").parse().map_err(|_| {
                    RelayError::InvalidConfig("RELAY_PORT must be a valid port number".into())
                })?,
                host: get_env_or("RELAY_HOST", "0.0.0.0"),
                max_attempts: get_env_or("RELAY_MAX_ATTEMPTS", "3").parse().unwrap_or(3),
                attempt_timeout: get_env_or("RELAY_ATTEMPT_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
                request_delay: get_env_or("RELAY_REQUEST_DELAY", "1").parse().unwrap_or(1),
                retry_backoff: get_env_or("RELAY_RETRY_BACKOFF", "1").parse().unwrap_or(1),
            },
            pool: PoolConfig {
                source_url: get_env_or("POOL_SOURCE_URL", DEFAULT_SOURCE_URL),
                fetch_timeout: get_env_or("POOL_FETCH_TIMEOUT", "30").parse().unwrap_or(30),
                refresh_interval: get_env_or("POOL_REFRESH_INTERVAL", "1800")
                    .parse()
                    .unwrap_or(1800),
                validation_url: get_env_or("POOL_VALIDATION_URL", DEFAULT_VALIDATION_URL),
                validation_timeout: get_env_or("POOL_VALIDATION_TIMEOUT", "10")
                    .parse()
                    .unwrap_or(10),
                validation_sample: get_env_or("POOL_VALIDATION_SAMPLE", "100")
                    .parse()
                    .unwrap_or(100),
                fallback_sample: get_env_or("POOL_FALLBACK_SAMPLE", "50")
                    .parse()
                    .unwrap_or(50),
                validation_workers: get_env_or("POOL_VALIDATION_WORKERS", "10")
                    .parse()
                    .unwrap_or(10),
            },
            status: StatusServerConfig {
                port: get_env_or("STATUS_PORT", "8888").parse().map_err(|_| {
                    RelayError::InvalidConfig("STATUS_PORT must be a valid port number".into())
                })?,
                host: get_env_or("STATUS_HOST", "0.0.0.0"),
                check_interval: get_env_or("STATUS_CHECK_INTERVAL", "60")
                    .parse()
                    .unwrap_or(60),
                probe_timeout: get_env_or("STATUS_PROBE_TIMEOUT", "15").parse().unwrap_or(15),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Validate cross-field constraints that `from_env` cannot express
    pub fn validate(&self) -> Result<()> {
        if self.relay.max_attempts == 0 {
            return Err(RelayError::InvalidConfig(
                "RELAY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.pool.validation_sample == 0 {
            return Err(RelayError::InvalidConfig(
                "POOL_VALIDATION_SAMPLE must be at least 1".into(),
            ));
        }
        if self.pool.validation_workers == 0 {
            return Err(RelayError::InvalidConfig(
                "POOL_VALIDATION_WORKERS must be at least 1".into(),
            ));
        }
        Url::parse(&self.pool.source_url).map_err(|e| {
            RelayError::InvalidConfig(format!("POOL_SOURCE_URL must be a valid URL: {}", e))
        })?;
        Url::parse(&self.pool.validation_url).map_err(|e| {
            RelayError::InvalidConfig(format!("POOL_VALIDATION_URL must be a valid URL: {}", e))
        })?;
        Ok(())
    }

    /// Get the relay server address
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay.host, self.relay.port)
    }

    /// Get the status server address
    pub fn status_addr(&self) -> String {
        format!("{}:{}", self.status.host, self.status.port)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
