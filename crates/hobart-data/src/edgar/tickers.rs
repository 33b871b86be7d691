//! Ticker to CIK snapshot.
//!
//! CIK (Central Index Key) is the stable identifier the SEC assigns to every
//! company filing with EDGAR. The registry publishes the full ticker mapping
//! as one JSON document; it is loaded wholesale into a [`TickerCache`] and
//! replaced wholesale on refresh.

use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A company known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Upper-case ticker symbol
    pub ticker: String,
    /// CIK, zero-padded to 10 digits
    pub cik: String,
    /// Company name
    pub name: String,
}

/// Raw company ticker data from SEC JSON.
///
/// The SEC returns: `{"0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}, ...}`
#[derive(Debug, Deserialize)]
struct CompanyTicker {
    /// CIK as a number (SEC returns this as an integer despite the name)
    cik_str: u64,
    ticker: String,
    title: String,
}

/// Immutable snapshot of the registry's ticker mapping.
#[derive(Debug, Clone, Default)]
pub struct TickerCache {
    companies: HashMap<String, CompanyRecord>,
    fetched_at: Option<DateTime<Utc>>,
}

impl TickerCache {
    /// Parse the `company_tickers.json` document.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let data: HashMap<String, CompanyTicker> = serde_json::from_slice(body)
            .map_err(|e| DataError::Parse(format!("Failed to parse company tickers: {}", e)))?;

        let companies = data
            .into_values()
            .map(|company| {
                let ticker = company.ticker.trim().to_uppercase();
                let record = CompanyRecord {
                    ticker: ticker.clone(),
                    cik: Self::pad_cik(&company.cik_str.to_string()),
                    name: company.title,
                };
                (ticker, record)
            })
            .collect();

        Ok(Self {
            companies,
            fetched_at: Some(Utc::now()),
        })
    }

    /// Build a snapshot from already-known records.
    pub fn from_records(records: impl IntoIterator<Item = CompanyRecord>) -> Self {
        let companies = records
            .into_iter()
            .map(|mut record| {
                record.ticker = record.ticker.to_uppercase();
                record.cik = Self::pad_cik(&record.cik);
                (record.ticker.clone(), record)
            })
            .collect();
        Self {
            companies,
            fetched_at: None,
        }
    }

    /// Look up a company by ticker (case-insensitive).
    pub fn get(&self, ticker: &str) -> Option<&CompanyRecord> {
        self.companies.get(&ticker.trim().to_uppercase())
    }

    /// Number of companies in the snapshot.
    pub fn len(&self) -> usize {
        self.companies.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// When the snapshot was fetched from the registry.
    pub const fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Companies whose ticker or name contains `term` (case-insensitive),
    /// sorted by ticker. An empty term matches everything.
    pub fn search(&self, term: &str, limit: usize) -> Vec<&CompanyRecord> {
        let needle = term.trim().to_lowercase();
        let mut matches: Vec<&CompanyRecord> = self
            .companies
            .values()
            .filter(|c| {
                needle.is_empty()
                    || c.ticker.to_lowercase().contains(&needle)
                    || c.name.to_lowercase().contains(&needle)
            })
            .collect();
        matches.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        matches.truncate(limit);
        matches
    }

    /// Pad CIK to 10 digits as required by SEC.
    ///
    /// # Example
    /// ```
    /// # use hobart_data::edgar::TickerCache;
    /// assert_eq!(TickerCache::pad_cik("320193"), "0000320193");
    /// ```
    pub fn pad_cik(cik: &str) -> String {
        format!("{:0>10}", cik.trim())
    }

    /// Strip the zero padding from a CIK, as used in archive URLs.
    pub fn unpad_cik(cik: &str) -> &str {
        let trimmed = cik.trim().trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }
    }
}
