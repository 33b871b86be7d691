#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod atomic;
pub mod cancel;
pub mod download;
pub mod edgar;
pub mod error;
pub mod layout;
pub mod rate_limit;
pub mod retry;

pub use cancel::CancelFlag;
pub use download::{DownloadManager, DownloadResult};
pub use error::{DataError, ErrorKind, Failure, Result};
pub use layout::OutputLayout;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
