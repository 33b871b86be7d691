//! Batch runs over tickers and documents.
//!
//! Downloads run one ticker at a time, since every registry request goes
//! through the same rate-limited gate. Conversions of distinct documents are
//! independent and run concurrently, bounded by the configured limit. No
//! single failure stops a run: each is recorded against its item.

use crate::config::Config;
use crate::error::Result;
use futures::stream::{self, StreamExt};
use hobart_convert::{ConversionChain, ConversionOutcome, TargetFormat, output_path};
use hobart_data::edgar::{FormType, RegistryClient};
use hobart_data::download::is_filing_document;
use hobart_data::{CancelFlag, DownloadManager, DownloadResult, Failure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What a conversion pass produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Output format
    pub format: TargetFormat,
    /// Directory for outputs; next to each source when `None`
    pub output_dir: Option<PathBuf>,
    /// Documents converted at the same time
    pub concurrency: usize,
}

impl ConvertOptions {
    /// Options from the `conversion` section of a config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            format: config.conversion.output_format,
            output_dir: None,
            concurrency: config.conversion.concurrency,
        }
    }
}

/// What a batch run downloads, and whether it converts the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Form types to fetch
    pub form_types: Vec<FormType>,
    /// Most recent filings fetched per ticker
    pub max_count: usize,
    /// Convert every downloaded document when set
    pub convert: Option<ConvertOptions>,
}

impl BatchOptions {
    /// Download-only options from a config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            form_types: config.download.form_types.clone(),
            max_count: config.download.max_reports_per_company,
            convert: None,
        }
    }
}

/// Result of one ticker: its filings, or the failure that stopped it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickerReport {
    /// One entry per filing attempted
    pub results: Vec<DownloadResult>,
    /// Ticker-level failure (resolution or listing)
    pub error: Option<Failure>,
}

impl TickerReport {
    fn downloaded(results: Vec<DownloadResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    fn failed(error: Failure) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error),
        }
    }

    /// Filings written to disk.
    pub fn saved(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Filings that failed.
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.saved()
    }

    /// Whether the ticker or any of its filings failed.
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.failed_count() > 0
    }
}

/// Everything a run did, keyed for stable output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-ticker results, by upper-case ticker
    pub tickers: BTreeMap<String, TickerReport>,
    /// Per-document conversion outcomes, by source path
    pub conversions: BTreeMap<PathBuf, ConversionOutcome>,
    /// Whether the run stopped early on request
    pub cancelled: bool,
}

impl BatchReport {
    /// Whether any item failed. Drives the process exit status.
    pub fn has_failures(&self) -> bool {
        self.tickers.values().any(TickerReport::has_failures)
            || self.conversions.values().any(|o| !o.succeeded())
    }

    /// Every per-filing result, in ticker order.
    pub fn download_results(&self) -> impl Iterator<Item = &DownloadResult> {
        self.tickers.values().flat_map(|t| t.results.iter())
    }

    /// Paths of every document written.
    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.download_results()
            .filter_map(|r| r.local_path.clone())
            .collect()
    }
}

/// Observer notified as a run progresses. Every method defaults to a no-op.
pub trait BatchProgress: Send + Sync {
    /// A ticker is about to be downloaded.
    fn ticker_started(&self, _ticker: &str) {}

    /// A ticker finished, successfully or not.
    fn ticker_finished(&self, _ticker: &str, _report: &TickerReport) {}

    /// A conversion pass over `_total` documents is starting.
    fn conversions_started(&self, _total: usize) {}

    /// One document finished converting.
    fn conversion_finished(&self, _outcome: &ConversionOutcome) {}
}

/// Progress observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl BatchProgress for NoProgress {}

/// Drives tickers through the download manager and documents through the
/// conversion chain.
pub struct BatchCoordinator {
    downloads: DownloadManager,
    chain: ConversionChain,
    cancel: CancelFlag,
    progress: Arc<dyn BatchProgress>,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("downloads", &self.downloads)
            .field("chain", &self.chain)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    /// Coordinator over an existing download manager and chain.
    pub fn new(downloads: DownloadManager, chain: ConversionChain) -> Self {
        Self {
            downloads,
            chain,
            cancel: CancelFlag::new(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Coordinator talking to the live registry, built from a validated config.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = RegistryClient::new(config.registry_settings())?;
        let downloads = DownloadManager::new(Arc::new(client), &config.download.output_dir);
        let chain = ConversionChain::new(config.chain_settings())?;
        Ok(Self::new(downloads, chain))
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.downloads = self.downloads.with_cancel_flag(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Report progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn BatchProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// The download manager.
    pub const fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// The conversion chain.
    pub const fn chain(&self) -> &ConversionChain {
        &self.chain
    }

    /// Download every ticker, then convert what was downloaded if asked to.
    ///
    /// Tickers are processed in the order given; repeated tickers are
    /// processed once.
    pub async fn run(&self, tickers: &[String], options: &BatchOptions) -> BatchReport {
        let mut report = BatchReport::default();

        for raw in tickers {
            let ticker = raw.trim().to_uppercase();
            if report.tickers.contains_key(&ticker) {
                continue;
            }
            if self.cancel.is_cancelled() {
                warn!("cancelled, skipping remaining tickers");
                report.cancelled = true;
                break;
            }

            self.progress.ticker_started(&ticker);
            let ticker_report = match self
                .downloads
                .download_filings(&ticker, &options.form_types, options.max_count)
                .await
            {
                Ok(results) => TickerReport::downloaded(results),
                Err(e) => {
                    warn!(ticker = %ticker, kind = %e.kind(), error = %e, "ticker failed");
                    TickerReport::failed(Failure::from(&e))
                }
            };
            self.progress.ticker_finished(&ticker, &ticker_report);
            report.tickers.insert(ticker, ticker_report);
        }

        if let Some(convert) = &options.convert {
            let sources: Vec<PathBuf> = report
                .downloaded_paths()
                .into_iter()
                .filter(|p| is_filing_document(p))
                .collect();
            let converted = self.convert_paths(&sources, convert).await;
            report.conversions = converted.conversions;
            report.cancelled |= converted.cancelled;
        }

        let saved: usize = report.tickers.values().map(TickerReport::saved).sum();
        info!(
            tickers = report.tickers.len(),
            saved,
            conversions = report.conversions.len(),
            failures = report.has_failures(),
            "batch finished"
        );
        report
    }

    /// Convert existing documents.
    ///
    /// Every distinct source gets a distinct output path, so concurrent
    /// conversions never write the same file.
    pub async fn convert_paths(&self, paths: &[PathBuf], options: &ConvertOptions) -> BatchReport {
        let plan = plan_outputs(paths, options.format, options.output_dir.as_deref());
        self.progress.conversions_started(plan.len());

        let chain = &self.chain;
        let cancel = &self.cancel;
        let progress = &self.progress;
        let format = options.format;

        let outcomes: Vec<Option<ConversionOutcome>> = stream::iter(plan)
            .map(|(source, target)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let outcome = chain.convert(&source, &target, format).await;
                progress.conversion_finished(&outcome);
                Some(outcome)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        let cancelled = outcomes.iter().any(Option::is_none);
        if cancelled {
            warn!("cancelled, remaining conversions skipped");
        }
        BatchReport {
            conversions: outcomes
                .into_iter()
                .flatten()
                .map(|o| (o.source.clone(), o))
                .collect(),
            cancelled,
            ..BatchReport::default()
        }
    }
}

/// Output path for each distinct source, in source order.
///
/// Sources that would share an output path (`a.htm` and `a.txt` in the same
/// directory) keep their full file name instead: `a.htm.pdf`, `a.txt.pdf`.
/// Any path still taken, including by another source, gets a numeric suffix
/// (`a.htm-2.pdf`). A source that is already in the target format is left
/// out of the plan.
pub fn plan_outputs(
    paths: &[PathBuf],
    format: TargetFormat,
    output_dir: Option<&Path>,
) -> Vec<(PathBuf, PathBuf)> {
    let mut seen = BTreeSet::new();
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    for path in paths {
        if !seen.insert(path) {
            continue;
        }
        let target = output_path(path, format, output_dir);
        if target == *path {
            warn!(path = %path.display(), "already {format}, skipping");
            continue;
        }
        sources.push(path);
        targets.push(target);
    }

    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for target in &targets {
        *counts.entry(target.as_path()).or_default() += 1;
    }

    let mut claimed: HashSet<PathBuf> = seen.iter().map(|p| (*p).clone()).collect();
    let mut plan = Vec::with_capacity(sources.len());
    for (source, target) in sources.iter().zip(&targets) {
        let preferred = if counts.get(target.as_path()).copied().unwrap_or(0) > 1 {
            let mut name = source.file_name().unwrap_or_default().to_os_string();
            name.push(".");
            name.push(format.extension());
            target.with_file_name(name)
        } else {
            target.clone()
        };

        let mut candidate = preferred.clone();
        let mut n = 2;
        while claimed.contains(&candidate) {
            let mut name = preferred
                .with_extension("")
                .file_name()
                .unwrap_or_default()
                .to_os_string();
            name.push(format!("-{n}.{}", format.extension()));
            candidate = preferred.with_file_name(name);
            n += 1;
        }
        claimed.insert(candidate.clone());
        plan.push(((*source).clone(), candidate));
    }
    plan
}

/// Convertible filing documents under `dir`, sorted.
///
/// Outputs of earlier conversion passes are not picked up again.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_filing_document(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
