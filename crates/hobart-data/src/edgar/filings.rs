//! Filing records and the SEC submissions index.
//!
//! The submissions API returns filing information as parallel arrays where
//! each index corresponds to a single filing. The most recent filings are
//! inlined under `filings.recent`; older ones live in separately fetched
//! index pages listed under `filings.files`.

use crate::edgar::tickers::TickerCache;
use crate::error::{DataError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Regulatory form type of a filing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormType {
    /// Annual report
    TenK,
    /// Amended annual report
    TenKA,
    /// Quarterly report
    TenQ,
    /// Amended quarterly report
    TenQA,
    /// Current report
    EightK,
    /// Annual report of a foreign private issuer
    TwentyF,
    /// Annual report of a Canadian issuer
    FortyF,
    /// Any other form, stored upper-case
    Other(String),
}

impl FormType {
    /// Canonical registry spelling (e.g. `10-K/A`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::TenK => "10-K",
            Self::TenKA => "10-K/A",
            Self::TenQ => "10-Q",
            Self::TenQA => "10-Q/A",
            Self::EightK => "8-K",
            Self::TwentyF => "20-F",
            Self::FortyF => "40-F",
            Self::Other(form) => form,
        }
    }

    /// Spelling safe to embed in a file name (`/` replaced by `-`).
    pub fn file_label(&self) -> String {
        self.as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect()
    }
}

impl FromStr for FormType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Ok(match normalized.as_str() {
            "10-K" | "10K" => Self::TenK,
            "10-K/A" | "10-KA" => Self::TenKA,
            "10-Q" | "10Q" => Self::TenQ,
            "10-Q/A" | "10-QA" => Self::TenQA,
            "8-K" | "8K" => Self::EightK,
            "20-F" | "20F" => Self::TwentyF,
            "40-F" | "40F" => Self::FortyF,
            _ => Self::Other(normalized),
        })
    }
}

impl From<String> for FormType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(form) => form,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for FormType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<FormType> for String {
    fn from(value: FormType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accession number: the globally unique identifier of one submission,
/// formatted `NNNNNNNNNN-NN-NNNNNN`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, derive_more::Display,
)]
#[display("{_0}")]
pub struct AccessionNumber(String);

impl AccessionNumber {
    /// Parse an accession number, accepting the dashed or the 18-digit form.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let digits: String = value.chars().filter(|c| *c != '-').collect();
        let dashed_ok = value.len() == 20
            && value.as_bytes()[10] == b'-'
            && value.as_bytes()[13] == b'-';
        let plain_ok = value.len() == 18;

        if digits.len() != 18
            || !digits.chars().all(|c| c.is_ascii_digit())
            || !(dashed_ok || plain_ok)
        {
            return Err(DataError::Parse(format!(
                "Invalid accession number: {:?}",
                value
            )));
        }

        Ok(Self(format!(
            "{}-{}-{}",
            &digits[..10],
            &digits[10..12],
            &digits[12..]
        )))
    }

    /// Dashed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits only, as used in archive URLs.
    pub fn without_dashes(&self) -> String {
        self.0.replace('-', "")
    }
}

impl<'de> Deserialize<'de> for AccessionNumber {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One filing of a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    /// Form type (e.g., "10-K", "10-Q")
    pub form_type: FormType,
    /// Filing date
    pub filing_date: NaiveDate,
    /// End of the reporting period, when the registry provides one
    pub report_date: Option<NaiveDate>,
    /// Accession number (unique filing identifier)
    pub accession_number: AccessionNumber,
    /// Primary document filename
    pub primary_document: String,
    /// Approximate size of the submission in bytes
    pub size_bytes: u64,
}

impl FilingRecord {
    /// URL of the primary document under the given archive root.
    ///
    /// # Example
    /// ```
    /// # use hobart_data::edgar::{AccessionNumber, FilingRecord, FormType};
    /// # use chrono::NaiveDate;
    /// let filing = FilingRecord {
    ///     form_type: FormType::TenK,
    ///     filing_date: NaiveDate::from_ymd_opt(2023, 11, 3).unwrap(),
    ///     report_date: None,
    ///     accession_number: AccessionNumber::parse("0000320193-23-000106").unwrap(),
    ///     primary_document: "aapl-20230930.htm".to_string(),
    ///     size_bytes: 0,
    /// };
    /// let url = filing.document_url("https://www.sec.gov/Archives/edgar", "0000320193");
    /// assert!(url.ends_with("data/320193/000032019323000106/aapl-20230930.htm"));
    /// ```
    pub fn document_url(&self, documents_url: &str, cik: &str) -> String {
        format!(
            "{}/data/{}/{}/{}",
            documents_url.trim_end_matches('/'),
            TickerCache::unpad_cik(cik),
            self.accession_number.without_dashes(),
            self.primary_document
        )
    }
}

/// Sort filings newest first; ties are broken by accession number, newest first.
pub fn sort_filings(filings: &mut [FilingRecord]) {
    filings.sort_by(|a, b| {
        b.filing_date
            .cmp(&a.filing_date)
            .then_with(|| b.accession_number.cmp(&a.accession_number))
    });
}

/// Company submissions document (`submissions/CIK##########.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Submissions {
    /// Company name
    #[serde(default)]
    pub name: String,
    /// Filing history
    pub filings: SubmissionFilings,
}

/// Filing history container.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionFilings {
    /// Most recent filings, inlined
    pub recent: FilingColumns,
    /// Older index pages
    #[serde(default)]
    pub files: Vec<IndexPage>,
}

/// Reference to an older page of the submissions index.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPage {
    /// File name, relative to the submissions endpoint
    pub name: String,
    /// Number of filings in the page
    #[serde(default)]
    pub filing_count: u64,
    /// Oldest filing date in the page
    #[serde(default)]
    pub filing_from: Option<String>,
    /// Newest filing date in the page
    #[serde(default)]
    pub filing_to: Option<String>,
}

/// Columnar filing data, as found in `recent` and in each index page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingColumns {
    /// Accession numbers
    pub accession_number: Vec<String>,
    /// Filing dates in YYYY-MM-DD format
    pub filing_date: Vec<String>,
    /// Report dates in YYYY-MM-DD format (may be empty strings)
    #[serde(default)]
    pub report_date: Vec<String>,
    /// Form types
    pub form: Vec<String>,
    /// Primary document filenames
    #[serde(default)]
    pub primary_document: Vec<String>,
    /// Submission sizes in bytes
    #[serde(default)]
    pub size: Vec<u64>,
}

impl FilingColumns {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.accession_number.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.accession_number.is_empty()
    }

    /// Rows whose form is in `form_types` (all rows when empty).
    ///
    /// Rows that cannot be parsed or that have no primary document are
    /// skipped with a warning.
    pub fn records(&self, form_types: &[FormType]) -> Vec<FilingRecord> {
        let mut records = Vec::new();

        for idx in 0..self.len() {
            let Some(form) = self.form.get(idx).map(|f| FormType::from(f.as_str())) else {
                continue;
            };
            if !form_types.is_empty() && !form_types.contains(&form) {
                continue;
            }

            match self.record_at(idx, form) {
                Ok(record) => records.push(record),
                Err(e) => warn!(index = idx, error = %e, "skipping malformed filing row"),
            }
        }

        records
    }

    fn record_at(&self, idx: usize, form_type: FormType) -> Result<FilingRecord> {
        let accession_number = AccessionNumber::parse(&self.accession_number[idx])?;

        let filing_date = self
            .filing_date
            .get(idx)
            .ok_or_else(|| DataError::Parse(format!("Missing filing date at row {}", idx)))
            .and_then(|raw| parse_date(raw))?;

        let report_date = self
            .report_date
            .get(idx)
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| parse_date(raw).ok());

        let primary_document = self
            .primary_document
            .get(idx)
            .map(|doc| doc.trim().to_string())
            .filter(|doc| !doc.is_empty())
            .ok_or_else(|| {
                DataError::Parse(format!("Missing primary document for {}", accession_number))
            })?;

        Ok(FilingRecord {
            form_type,
            filing_date,
            report_date,
            accession_number,
            primary_document,
            size_bytes: self.size.get(idx).copied().unwrap_or(0),
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("Invalid filing date {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10-K", FormType::TenK)]
    #[case("10-k", FormType::TenK)]
    #[case("10-K/A", FormType::TenKA)]
    #[case("10-Q", FormType::TenQ)]
    #[case("8-K", FormType::EightK)]
    #[case("20-F", FormType::TwentyF)]
    #[case("S-1", FormType::Other("S-1".to_string()))]
    fn test_form_type_parse(#[case] raw: &str, #[case] expected: FormType) {
        assert_eq!(FormType::from(raw), expected);
    }

    #[test]
    fn test_form_type_display_and_label() {
        assert_eq!(FormType::TenKA.to_string(), "10-K/A");
        assert_eq!(FormType::TenKA.file_label(), "10-K-A");
        assert_eq!(FormType::TenQ.file_label(), "10-Q");
    }

    #[test]
    fn test_form_type_serde_roundtrip_uses_registry_spelling() {
        let json = serde_json::to_string(&FormType::TenQA).unwrap();
        assert_eq!(json, "\"10-Q/A\"");
        let back: FormType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FormType::TenQA);
    }

    #[rstest]
    #[case("0000320193-23-000106", true)]
    #[case("000032019323000106", true)]
    #[case("0000320193-23-00010", false)]
    #[case("00003201932-3-000106", false)]
    #[case("ABCDEFGHIJ-23-000106", false)]
    #[case("", false)]
    fn test_accession_number_parse(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(AccessionNumber::parse(raw).is_ok(), valid);
    }

    #[test]
    fn test_accession_number_normalizes() {
        let acc = AccessionNumber::parse("000032019323000106").unwrap();
        assert_eq!(acc.as_str(), "0000320193-23-000106");
        assert_eq!(acc.to_string(), "0000320193-23-000106");
        assert_eq!(acc.without_dashes(), "000032019323000106");
    }

    fn columns() -> FilingColumns {
        FilingColumns {
            accession_number: vec![
                "0000320193-24-000123".into(),
                "0000320193-24-000081".into(),
                "0000320193-23-000106".into(),
                "bad".into(),
            ],
            filing_date: vec![
                "2024-11-01".into(),
                "2024-08-02".into(),
                "2023-11-03".into(),
                "2023-01-01".into(),
            ],
            report_date: vec!["2024-09-28".into(), "".into(), "2023-09-30".into(), "".into()],
            form: vec!["10-K".into(), "10-Q".into(), "10-K".into(), "10-K".into()],
            primary_document: vec![
                "aapl-20240928.htm".into(),
                "aapl-20240629.htm".into(),
                "aapl-20230930.htm".into(),
                "x.htm".into(),
            ],
            size: vec![9_000_000, 5_000_000, 8_000_000],
        }
    }

    #[test]
    fn test_records_filter_by_form() {
        let records = columns().records(&[FormType::TenK]);
        assert_eq!(records.len(), 2, "malformed accession row is skipped");
        assert!(records.iter().all(|r| r.form_type == FormType::TenK));
        assert_eq!(records[0].size_bytes, 9_000_000);
        assert_eq!(
            records[0].report_date,
            NaiveDate::from_ymd_opt(2024, 9, 28)
        );
    }

    #[test]
    fn test_records_empty_filter_matches_all() {
        let records = columns().records(&[]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].report_date, None);
    }

    #[test]
    fn test_sort_filings_newest_first() {
        let mut records = columns().records(&[]);
        records.reverse();
        sort_filings(&mut records);
        let dates: Vec<_> = records.iter().map(|r| r.filing_date).collect();
        let mut expected = dates.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, expected);
    }

    #[test]
    fn test_parse_submissions() {
        let json = r#"{
            "cik": "320193",
            "name": "Apple Inc.",
            "filings": {
                "recent": {
                    "accessionNumber": ["0000320193-24-000123"],
                    "filingDate": ["2024-11-01"],
                    "reportDate": ["2024-09-28"],
                    "form": ["10-K"],
                    "primaryDocument": ["aapl-20240928.htm"],
                    "size": [9759608]
                },
                "files": [
                    {"name": "CIK0000320193-submissions-001.json", "filingCount": 1206,
                     "filingFrom": "1994-01-26", "filingTo": "2014-06-04"}
                ]
            }
        }"#;
        let submissions: Submissions = serde_json::from_str(json).unwrap();
        assert_eq!(submissions.name, "Apple Inc.");
        assert_eq!(submissions.filings.recent.len(), 1);
        assert_eq!(submissions.filings.files.len(), 1);
        assert_eq!(submissions.filings.files[0].filing_count, 1206);
    }
}
