#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod chain;
pub mod error;
pub mod html;
pub mod pdf;
pub mod source;
pub mod text;

pub use backend::{BackendKind, select_backends};
pub use chain::{
    ChainFailure, ChainSettings, ConversionAttempt, ConversionChain, ConversionOutcome,
    TargetFormat, output_path,
};
pub use error::{ConvertError, Result};
pub use source::{SourceInfo, SourceKind};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
