//! Run reports: the per-run CSV manifest and a JSON summary.

use crate::batch::BatchReport;
use crate::error::Result;
use hobart_data::atomic::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest written into the output directory.
pub const MANIFEST_FILE: &str = "manifest.csv";

/// One manifest line: a filing, or a ticker that failed before listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    /// Upper-case ticker
    pub ticker: String,
    /// Form type
    pub form_type: Option<String>,
    /// Filing date (`YYYY-MM-DD`)
    pub filing_date: Option<String>,
    /// Accession number
    pub accession_number: Option<String>,
    /// Registry name of the primary document
    pub primary_document: Option<String>,
    /// Where the document was written
    pub local_path: Option<String>,
    /// `ok` or `failed`
    pub status: String,
    /// Failure classification
    pub error_kind: Option<String>,
    /// Failure message
    pub error: Option<String>,
    /// Converted output, when the document was converted successfully
    pub converted_path: Option<String>,
    /// Backend that produced the converted output
    pub conversion_backend: Option<String>,
}

impl BatchReport {
    /// Manifest rows in ticker order, filings newest first.
    pub fn manifest_rows(&self) -> Vec<ManifestRow> {
        let mut rows = Vec::new();
        for (ticker, report) in &self.tickers {
            if let Some(error) = &report.error {
                rows.push(ManifestRow {
                    ticker: ticker.clone(),
                    form_type: None,
                    filing_date: None,
                    accession_number: None,
                    primary_document: None,
                    local_path: None,
                    status: "failed".to_string(),
                    error_kind: Some(error.kind.to_string()),
                    error: Some(error.message.clone()),
                    converted_path: None,
                    conversion_backend: None,
                });
            }
            for result in &report.results {
                let conversion = result
                    .local_path
                    .as_ref()
                    .and_then(|path| self.conversions.get(path));
                rows.push(ManifestRow {
                    ticker: ticker.clone(),
                    form_type: Some(result.filing.form_type.to_string()),
                    filing_date: Some(result.filing.filing_date.format("%Y-%m-%d").to_string()),
                    accession_number: Some(result.filing.accession_number.to_string()),
                    primary_document: Some(result.filing.primary_document.clone()),
                    local_path: result.local_path.as_ref().map(|p| p.display().to_string()),
                    status: if result.is_success() { "ok" } else { "failed" }.to_string(),
                    error_kind: result.error.as_ref().map(|e| e.kind.to_string()),
                    error: result.error.as_ref().map(|e| e.message.clone()),
                    converted_path: conversion
                        .and_then(|o| o.output_path())
                        .map(|p| p.display().to_string()),
                    conversion_backend: conversion
                        .and_then(|o| o.backend())
                        .map(|b| b.to_string()),
                });
            }
        }
        rows
    }

    /// Counts and failures of the run.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            tickers: self.tickers.len(),
            cancelled: self.cancelled,
            ..RunSummary::default()
        };

        for (ticker, report) in &self.tickers {
            summary.filings_saved += report.saved();
            summary.filings_failed += report.failed_count();
            if let Some(error) = &report.error {
                summary.tickers_failed += 1;
                summary.failures.push(FailureLine {
                    item: ticker.clone(),
                    kind: error.kind.to_string(),
                    message: error.message.clone(),
                });
            }
            for result in &report.results {
                if let Some(error) = &result.error {
                    summary.failures.push(FailureLine {
                        item: format!("{ticker} {}", result.filing.accession_number),
                        kind: error.kind.to_string(),
                        message: error.message.clone(),
                    });
                }
            }
        }

        for (source, outcome) in &self.conversions {
            if outcome.succeeded() {
                summary.conversions_succeeded += 1;
                continue;
            }
            summary.conversions_failed += 1;
            let (kind, message) = outcome
                .source_error
                .as_ref()
                .or_else(|| outcome.final_attempt().and_then(|a| a.error.as_ref()))
                .map(|e| (e.kind.to_string(), e.message.clone()))
                .unwrap_or_default();
            summary.failures.push(FailureLine {
                item: source.display().to_string(),
                kind: outcome
                    .failure()
                    .map(|f| format!("{f}: {kind}"))
                    .unwrap_or(kind),
                message,
            });
        }
        summary
    }
}

/// Aggregate view of a run, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tickers processed
    pub tickers: usize,
    /// Tickers that failed before any filing was fetched
    pub tickers_failed: usize,
    /// Filings written
    pub filings_saved: usize,
    /// Filings that failed
    pub filings_failed: usize,
    /// Documents converted
    pub conversions_succeeded: usize,
    /// Documents that could not be converted
    pub conversions_failed: usize,
    /// Whether the run stopped early
    pub cancelled: bool,
    /// One line per failed item
    pub failures: Vec<FailureLine>,
}

/// A failed item in a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLine {
    /// Ticker, filing or source path
    pub item: String,
    /// Failure classification
    pub kind: String,
    /// Failure message
    pub message: String,
}

impl RunSummary {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render manifest rows as CSV.
pub fn manifest_csv(rows: &[ManifestRow]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// Write `report`'s manifest to `output_dir/manifest.csv`, replacing any
/// previous one.
pub fn write_manifest(report: &BatchReport, output_dir: &Path) -> Result<PathBuf> {
    let bytes = manifest_csv(&report.manifest_rows())?;
    Ok(write_atomic(output_dir.join(MANIFEST_FILE), &bytes)?)
}
