//! Error types for document conversion.

use hobart_data::{ErrorKind, Failure};
use std::time::Duration;
use thiserror::Error;

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors raised by a conversion backend or the HTML extractor.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source has no usable content
    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend is not present in this environment
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend ran but produced no valid output
    #[error("Render error: {0}")]
    Render(String),

    /// Attempt exceeded its wall-clock budget
    #[error("Attempt timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// PDF object model error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Invalid chain configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Parse(_) => ErrorKind::Parse,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Render(_) | Self::Timeout(_) | Self::Pdf(_) => ErrorKind::Render,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

impl From<&ConvertError> for Failure {
    fn from(err: &ConvertError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<tokio::task::JoinError> for ConvertError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Render(format!("renderer task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConvertError::Parse("empty".into()), ErrorKind::Parse)]
    #[case(ConvertError::BackendUnavailable("wkhtmltopdf".into()), ErrorKind::BackendUnavailable)]
    #[case(ConvertError::Timeout(Duration::from_secs(600)), ErrorKind::Render)]
    #[case(ConvertError::Io(std::io::Error::other("disk full")), ErrorKind::Io)]
    fn test_kind(#[case] err: ConvertError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_failure_conversion() {
        let failure = Failure::from(&ConvertError::Render("blank page".into()));
        assert_eq!(failure.kind, ErrorKind::Render);
        assert!(failure.message.contains("blank page"));
    }
}
