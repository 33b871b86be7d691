//! Error types for registry and download operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for registry and download operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Coarse classification of a failure.
///
/// Per-item failures (one filing, one document, one backend attempt) are
/// recorded as data using this classification rather than propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Transport failure, connection reset, timeout or server-side error.
    Network,
    /// Explicit throttling signal (HTTP 429) from the registry.
    RateLimited,
    /// Unknown ticker or missing document.
    NotFound,
    /// Local filesystem failure.
    Io,
    /// Malformed registry payload or source markup.
    Parse,
    /// Conversion backend not present in the environment.
    BackendUnavailable,
    /// Conversion backend ran but produced no valid output.
    Render,
    /// Invalid configuration, fatal for the whole run.
    Config,
}

impl ErrorKind {
    /// Stable name used in logs and manifests.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NetworkError",
            Self::RateLimited => "RateLimitedError",
            Self::NotFound => "NotFoundError",
            Self::Io => "IOError",
            Self::Parse => "ParseError",
            Self::BackendUnavailable => "BackendUnavailableError",
            Self::Render => "RenderError",
            Self::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure captured as data: its kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure classification
    pub kind: ErrorKind,
    /// Description of what went wrong
    pub message: String,
}

impl Failure {
    /// Create a new failure record.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&DataError> for Failure {
    fn from(err: &DataError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Errors that can occur while talking to the registry or writing filings.
#[derive(Debug, Error)]
pub enum DataError {
    /// HTTP client error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Registry answered with HTTP 429
    #[error("Rate limited by registry{}", retry_after_suffix(.retry_after))]
    RateLimited {
        /// Delay requested through the `Retry-After` header, if any
        retry_after: Option<Duration>,
    },

    /// Unexpected HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the registry
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// CIK not found for ticker
    #[error("CIK not found for ticker: {0}")]
    CikNotFound(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(", retry after {}ms", d.as_millis())
    })
}

impl DataError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Transport(_) | Self::HttpStatus { .. } => ErrorKind::Network,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NotFound(_) | Self::CikNotFound(_) => ErrorKind::NotFound,
            Self::Parse(_) | Self::Serialization(_) => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Whether a retry may succeed where this attempt failed.
    ///
    /// Only transport failures, server errors and throttling are retried.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
