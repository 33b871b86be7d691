#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod error;
pub mod report;

// Re-export the sub-crates
pub use hobart_convert as convert;
pub use hobart_data as data;

pub use batch::{
    BatchCoordinator, BatchOptions, BatchProgress, BatchReport, ConvertOptions, NoProgress,
    TickerReport,
};
pub use config::Config;
pub use error::{ConfigError, HobartError, Result};
pub use report::{ManifestRow, RunSummary, write_manifest};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
