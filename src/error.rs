use http::StatusCode;
use thiserror::Error;

/// Transport-level classification of a single outbound attempt.
///
/// A received HTTP response is never an error, whatever its status; these
/// kinds only cover attempts that produced no response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutboundError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("outbound request failed: {0}")]
    Other(String),
}

impl OutboundError {
    /// Status surfaced to the relay client once every attempt has failed
    /// with this kind.
    pub fn terminal_status(&self) -> StatusCode {
        match self {
            OutboundError::Timeout | OutboundError::Connect(_) => StatusCode::GATEWAY_TIMEOUT,
            OutboundError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for OutboundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OutboundError::Timeout
        } else if err.is_connect() {
            OutboundError::Connect(err.to_string())
        } else {
            OutboundError::Other(err.to_string())
        }
    }
}

/// Unified error type for the Detour application
#[derive(Error, Debug)]
pub enum RelayError {
    // Request errors
    #[error("no target URL in request path")]
    MissingTarget,

    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Forwarding errors
    #[error("all {attempts} forward attempts failed: {last}")]
    AttemptsExhausted { attempts: u32, last: OutboundError },

    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for Detour operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::MissingTarget
            | RelayError::InvalidTarget(_)
            | RelayError::InvalidRequest(_)
            | RelayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 504 for transport exhaustion, 500 for anything unclassified
            RelayError::AttemptsExhausted { last, .. } => last.terminal_status(),

            // 500 Internal Server Error
            RelayError::Io(_) | RelayError::Http(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Convert from hyper errors
impl From<hyper::Error> for RelayError {
    fn from(err: hyper::Error) -> Self {
        RelayError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::InvalidTarget(err.to_string())
    }
}
