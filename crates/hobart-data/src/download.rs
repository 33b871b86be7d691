//! Per-ticker filing downloads.
//!
//! Resolution and listing failures abort the ticker; a failure fetching or
//! writing one filing is recorded in that filing's [`DownloadResult`] and the
//! remaining filings are still processed.

use crate::atomic::write_atomic;
use crate::cancel::CancelFlag;
use crate::edgar::{FilingRecord, FormType, RegistryClient};
use crate::error::{DataError, ErrorKind, Failure, Result};
use crate::layout::OutputLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of downloading one filing.
///
/// Exactly one of `local_path` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Upper-case ticker the filing belongs to
    pub ticker: String,
    /// The filing
    pub filing: FilingRecord,
    /// Where the primary document was written
    pub local_path: Option<PathBuf>,
    /// Why the download failed
    pub error: Option<Failure>,
}

impl DownloadResult {
    fn saved(ticker: &str, filing: FilingRecord, path: PathBuf) -> Self {
        Self {
            ticker: ticker.to_string(),
            filing,
            local_path: Some(path),
            error: None,
        }
    }

    fn failed(ticker: &str, filing: FilingRecord, error: Failure) -> Self {
        Self {
            ticker: ticker.to_string(),
            filing,
            local_path: None,
            error: Some(error),
        }
    }

    /// Whether the document was written.
    pub const fn is_success(&self) -> bool {
        self.local_path.is_some()
    }

    /// Failure classification, if the download failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Downloads filings into an [`OutputLayout`].
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: Arc<RegistryClient>,
    layout: OutputLayout,
    cancel: CancelFlag,
}

impl DownloadManager {
    /// Create a manager writing under `output_dir`.
    pub fn new(client: Arc<RegistryClient>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            layout: OutputLayout::new(output_dir),
            cancel: CancelFlag::new(),
        }
    }

    /// Use the given cancellation flag, checked between filings.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Output layout in use.
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// The registry client.
    pub fn client(&self) -> &Arc<RegistryClient> {
        &self.client
    }

    /// Download the `max_count` most recent filings of `form_types` for a ticker.
    ///
    /// # Errors
    /// Propagates ticker resolution and filing listing failures. Per-filing
    /// failures are returned as failed [`DownloadResult`]s instead.
    pub async fn download_filings(
        &self,
        ticker: &str,
        form_types: &[FormType],
        max_count: usize,
    ) -> Result<Vec<DownloadResult>> {
        let company = self.client.resolve_ticker(ticker).await?;
        info!(ticker = %company.ticker, cik = %company.cik, name = %company.name, "resolved ticker");

        let filings = self
            .client
            .list_filings(&company.cik, form_types, max_count)
            .await?;
        if filings.is_empty() {
            info!(ticker = %company.ticker, "no matching filings");
            return Ok(Vec::new());
        }

        let paths = self.layout.plan(&company.ticker, &filings);
        let mut results = Vec::with_capacity(filings.len());

        for (filing, path) in filings.into_iter().zip(paths) {
            if self.cancel.is_cancelled() {
                warn!(ticker = %company.ticker, "cancelled, skipping remaining filings");
                break;
            }

            let accession = filing.accession_number.clone();
            match self.download_one(&company.cik, &filing, path).await {
                Ok(saved) => {
                    debug!(ticker = %company.ticker, accession = %accession, path = %saved.display(), "saved filing");
                    results.push(DownloadResult::saved(&company.ticker, filing, saved));
                }
                Err(err) => {
                    warn!(
                        ticker = %company.ticker,
                        accession = %accession,
                        kind = %err.kind(),
                        error = %err,
                        "filing download failed"
                    );
                    results.push(DownloadResult::failed(
                        &company.ticker,
                        filing,
                        Failure::from(&err),
                    ));
                }
            }
        }

        let saved = results.iter().filter(|r| r.is_success()).count();
        info!(
            ticker = %company.ticker,
            saved,
            failed = results.len() - saved,
            "ticker download finished"
        );
        Ok(results)
    }

    async fn download_one(
        &self,
        cik: &str,
        filing: &FilingRecord,
        path: PathBuf,
    ) -> Result<PathBuf> {
        let body = self
            .client
            .fetch_document(cik, &filing.accession_number, &filing.primary_document)
            .await?;
        store(path, body).await
    }
}

async fn store(path: PathBuf, body: Vec<u8>) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &body))
        .await
        .map_err(|e| DataError::Io(std::io::Error::other(e)))?
        .map_err(DataError::from)
}

/// Whether `path` looks like a downloaded filing that can be converted.
///
/// Downloads store HTML as `.htm` and submissions as `.txt`. Conversion
/// outputs (`.html`, `.pdf`) and downloaded PDF or XML documents are not
/// sources.
pub fn is_filing_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "txt" | "htm"))
}
