//! Error types for presto-stream

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed connection URL or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Certificate bundle, passphrase or trust material could not be loaded
    #[error("credential error: {0}")]
    Credential(String),

    /// The engine rejected the statement
    #[error("query error: {0}")]
    Query(QueryError),

    /// The engine could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine answered with a non-success HTTP status
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
        /// Start of the response body
        body: String,
    },

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection was closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Caller violated the cursor contract
    #[error("usage error: {0}")]
    Usage(&'static str),

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Unexpected response from the engine
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON decoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by the engine for a submitted statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// Human-readable message from the engine
    pub message: String,
    /// Symbolic error name (e.g. `SYNTAX_ERROR`)
    pub error_name: Option<String>,
    /// Error class (e.g. `USER_ERROR`, `INTERNAL_ERROR`)
    pub error_type: Option<String>,
    /// Numeric error code
    pub error_code: Option<i64>,
    /// Id of the failed query, when the engine assigned one
    pub query_id: Option<String>,
}

impl QueryError {
    /// Create a query error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_name: None,
            error_type: None,
            error_code: None,
            query_id: None,
        }
    }

    /// Whether the engine blamed the statement rather than itself
    pub fn is_user_error(&self) -> bool {
        self.error_type.as_deref() == Some("USER_ERROR")
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_name {
            Some(name) => write!(f, "{} ({})", self.message, name),
            None => f.write_str(&self.message),
        }
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl Error {
    /// Whether a readiness probe should retry after this error.
    ///
    /// Query errors, network-level failures and 5xx answers are transient;
    /// everything else (structural URL errors, credential errors, client-side
    /// HTTP statuses such as 401 or 404, usage errors) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Query(_) | Error::Connection(_) | Error::ConnectionClosed => true,
            Error::Status { status, .. } => *status >= 500,
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Short label for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Credential(_) => "credential",
            Error::Query(_) => "query",
            Error::Connection(_) | Error::Http(_) | Error::ConnectionClosed => "connection",
            Error::Status { .. } => "http_status",
            Error::Usage(_) => "usage",
            Error::InvalidState { .. } => "invalid_state",
            Error::Protocol(_) | Error::Json(_) => "protocol",
            Error::Io(_) => "io",
        }
    }

    /// The engine's error, if this is a query error
    pub fn as_query_error(&self) -> Option<&QueryError> {
        match self {
            Error::Query(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
