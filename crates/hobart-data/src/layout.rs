//! Deterministic on-disk layout for downloaded filings.
//!
//! Filings land at `root/TICKER/TICKER_<filingDate>_<formType>.<ext>`. Paths
//! depend only on the filing's identity, so two workers never target the
//! same path unless they process the same filing.

use crate::edgar::FilingRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Output directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one ticker's filings.
    pub fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.root.join(sanitize_ticker(ticker))
    }

    /// Base path of a filing: `TICKER/TICKER_<date>_<form>.<ext>`.
    pub fn filing_path(&self, ticker: &str, filing: &FilingRecord) -> PathBuf {
        let ticker = sanitize_ticker(ticker);
        let name = format!(
            "{}_{}_{}.{}",
            ticker,
            filing.filing_date.format("%Y-%m-%d"),
            filing.form_type.file_label(),
            document_extension(&filing.primary_document)
        );
        self.root.join(&ticker).join(name)
    }

    /// Base path qualified with the accession number.
    pub fn qualified_filing_path(&self, ticker: &str, filing: &FilingRecord) -> PathBuf {
        let ticker = sanitize_ticker(ticker);
        let name = format!(
            "{}_{}_{}_{}.{}",
            ticker,
            filing.filing_date.format("%Y-%m-%d"),
            filing.form_type.file_label(),
            filing.accession_number.without_dashes(),
            document_extension(&filing.primary_document)
        );
        self.root.join(&ticker).join(name)
    }

    /// Paths for a batch of one ticker's filings, in the same order.
    ///
    /// Filings sharing a base path (same date and form) all get the
    /// accession-qualified path instead, so the result is collision-free and
    /// depends only on the set of filings.
    pub fn plan(&self, ticker: &str, filings: &[FilingRecord]) -> Vec<PathBuf> {
        let base: Vec<PathBuf> = filings
            .iter()
            .map(|filing| self.filing_path(ticker, filing))
            .collect();

        let mut counts: HashMap<&Path, usize> = HashMap::new();
        for path in &base {
            *counts.entry(path.as_path()).or_default() += 1;
        }

        filings
            .iter()
            .zip(&base)
            .map(|(filing, path)| {
                if counts.get(path.as_path()).copied().unwrap_or(0) > 1 {
                    self.qualified_filing_path(ticker, filing)
                } else {
                    path.clone()
                }
            })
            .collect()
    }
}

/// File extension for a downloaded document, from its registry name.
///
/// HTML documents keep `.htm`, everything unrecognized is stored as `.txt`.
pub fn document_extension(document: &str) -> &'static str {
    let ext = Path::new(document)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "htm" | "html" | "xhtml" => "htm",
        "xml" => "xml",
        "pdf" => "pdf",
        _ => "txt",
    }
}

/// Upper-case ticker with anything outside `[A-Z0-9.-]` replaced by `_`.
pub fn sanitize_ticker(ticker: &str) -> String {
    ticker
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::{AccessionNumber, FormType};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn filing(date: (i32, u32, u32), form: FormType, acc: &str, doc: &str) -> FilingRecord {
        FilingRecord {
            form_type: form,
            filing_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            report_date: None,
            accession_number: AccessionNumber::parse(acc).unwrap(),
            primary_document: doc.to_string(),
            size_bytes: 0,
        }
    }

    #[test]
    fn test_filing_path_layout() {
        let layout = OutputLayout::new("/data/reports");
        let f = filing(
            (2023, 11, 3),
            FormType::TenK,
            "0000320193-23-000106",
            "aapl-20230930.htm",
        );
        assert_eq!(
            layout.filing_path("aapl", &f),
            PathBuf::from("/data/reports/AAPL/AAPL_2023-11-03_10-K.htm")
        );
    }

    #[rstest]
    #[case("aapl-20230930.htm", "htm")]
    #[case("report.HTML", "htm")]
    #[case("0000950123-09-012345.txt", "txt")]
    #[case("primary_doc.xml", "xml")]
    #[case("noextension", "txt")]
    fn test_document_extension(#[case] doc: &str, #[case] ext: &str) {
        assert_eq!(document_extension(doc), ext);
    }

    #[test]
    fn test_sanitize_ticker() {
        assert_eq!(sanitize_ticker(" brk-b "), "BRK-B");
        assert_eq!(sanitize_ticker("a/b"), "A_B");
    }

    #[test]
    fn test_plan_disambiguates_collisions() {
        let layout = OutputLayout::new("out");
        let filings = vec![
            filing((2024, 5, 1), FormType::TenQ, "0000000001-24-000002", "a.htm"),
            filing((2024, 5, 1), FormType::TenQ, "0000000001-24-000001", "b.htm"),
            filing((2024, 2, 1), FormType::TenK, "0000000001-24-000000", "c.htm"),
        ];

        let paths = layout.plan("XYZ", &filings);
        assert_eq!(
            paths[0],
            PathBuf::from("out/XYZ/XYZ_2024-05-01_10-Q_000000000124000002.htm")
        );
        assert_eq!(
            paths[1],
            PathBuf::from("out/XYZ/XYZ_2024-05-01_10-Q_000000000124000001.htm")
        );
        assert_eq!(paths[2], PathBuf::from("out/XYZ/XYZ_2024-02-01_10-K.htm"));

        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }
}
