//! Error types for configuration and batch runs.

use hobart_convert::ConvertError;
use hobart_data::{DataError, ErrorKind};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, HobartError>;

/// Errors loading, validating or saving configuration. All are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`Config`](crate::config::Config)
    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_yaml::Error,
    },

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Config file could not be written
    #[error("Failed to write config: {0}")]
    Write(#[from] std::io::Error),

    /// A setting is out of range or malformed
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } | Self::Write(_) => ErrorKind::Io,
            Self::Parse { .. } | Self::Serialize(_) | Self::Invalid(_) => ErrorKind::Config,
        }
    }
}

/// Top-level error of the crate.
#[derive(Debug, Error)]
pub enum HobartError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry or download error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Conversion error
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HobartError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Data(e) => e.kind(),
            Self::Convert(e) => e.kind(),
            Self::Csv(_) | Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Parse,
        }
    }

    /// Whether the error must stop the whole run.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config)
    }
}
