//! Terminal progress for batch runs.

use hobart::convert::ConversionOutcome;
use hobart::{BatchProgress, TickerReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar driven by [`BatchProgress`] events.
#[derive(Debug)]
pub(crate) struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// A bar over `tickers` downloads; hidden when `quiet`.
    pub(crate) fn new(tickers: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(tickers as u64)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Stop drawing.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BatchProgress for CliProgress {
    fn ticker_started(&self, ticker: &str) {
        self.bar.set_message(format!("Downloading {ticker}..."));
    }

    fn ticker_finished(&self, ticker: &str, report: &TickerReport) {
        if let Some(error) = &report.error {
            self.bar
                .suspend(|| eprintln!("Warning: {ticker} failed: {error}"));
        }
        self.bar.inc(1);
    }

    fn conversions_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message(format!("Converting {total} documents..."));
    }

    fn conversion_finished(&self, outcome: &ConversionOutcome) {
        if let Some(failure) = outcome.failure() {
            self.bar.suspend(|| {
                eprintln!(
                    "Warning: could not convert {}: {failure}",
                    outcome.source.display()
                )
            });
        }
        self.bar.inc(1);
    }
}
