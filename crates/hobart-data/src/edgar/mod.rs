//! SEC EDGAR registry access.
//!
//! This module provides:
//! - Company CIK lookup from ticker symbols (owned, refreshable snapshot)
//! - Filing listing with paging through the submissions index
//! - Raw document retrieval
//!
//! # Example
//!
//! ```no_run
//! use hobart_data::edgar::{FormType, RegistryClient, RegistrySettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RegistryClient::new(RegistrySettings::new("Jane Analyst jane@example.com"))?;
//!     let company = client.resolve_ticker("AAPL").await?;
//!     let filings = client.list_filings(&company.cik, &[FormType::TenK], 5).await?;
//!     for filing in &filings {
//!         println!("{} {} {}", filing.filing_date, filing.form_type, filing.accession_number);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod filings;
pub mod tickers;
pub mod transport;

pub use client::{RegistryClient, RegistryEndpoints, RegistrySettings, validate_user_agent};
pub use filings::{AccessionNumber, FilingColumns, FilingRecord, FormType, Submissions};
pub use tickers::{CompanyRecord, TickerCache};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
