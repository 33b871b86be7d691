//! The conversion chain.
//!
//! For PDF output the configured backends are tried in order until one
//! succeeds; every backend reached leaves exactly one [`ConversionAttempt`].
//! HTML output is a single extraction step with no fallback.

use crate::backend::{
    BackendKind, ExternalRenderer, render_chunked, render_styled, select_backends,
};
use crate::backend::chunked::DEFAULT_CHUNK_SIZE;
use crate::backend::external::{DEFAULT_PROBE_TIMEOUT, DEFAULT_PROGRAM};
use crate::error::{ConvertError, Result};
use crate::html::convert_to_html;
use crate::source::SourceInfo;
use hobart_data::{CancelFlag, ErrorKind, Failure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default size above which the styled renderer is skipped (10 MiB).
pub const DEFAULT_SIZE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Default wall-clock budget per attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(600);

/// Output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// PDF through the backend chain
    #[default]
    #[display("pdf")]
    Pdf,
    /// Cleaned standalone HTML
    #[display("html")]
    Html,
}

impl TargetFormat {
    /// File extension of outputs in this format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "html" | "htm" => Ok(Self::Html),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// Output path for `source` in `format`: next to the source, or in
/// `output_dir` when given.
pub fn output_path(source: &Path, format: TargetFormat, output_dir: Option<&Path>) -> PathBuf {
    let renamed = source.with_extension(format.extension());
    match (output_dir, renamed.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => renamed,
    }
}

/// Chain configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    /// Backends in the order they are tried
    pub backend_order: Vec<BackendKind>,
    /// Sources at or above this size skip the styled renderer
    pub size_threshold_bytes: u64,
    /// Chunk size of the chunked renderer
    pub chunk_size_bytes: usize,
    /// Wall-clock budget per attempt
    pub attempt_timeout: Duration,
    /// External renderer program
    pub external_program: String,
    /// Budget for the external renderer's capability probe
    pub probe_timeout: Duration,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            backend_order: BackendKind::PDF_DEFAULT_ORDER.to_vec(),
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            external_program: DEFAULT_PROGRAM.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl ChainSettings {
    /// Check the settings before any conversion runs.
    pub fn validate(&self) -> Result<()> {
        if self.backend_order.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "backend order must name at least one backend".to_string(),
            ));
        }
        if let Some(bad) = self
            .backend_order
            .iter()
            .find(|b| **b == BackendKind::Html)
        {
            return Err(ConvertError::InvalidConfig(format!(
                "{bad} is not a PDF backend"
            )));
        }
        if self.chunk_size_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.size_threshold_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "size threshold must be positive".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "attempt timeout must be positive".to_string(),
            ));
        }
        if self.backend_order.contains(&BackendKind::External)
            && self.external_program.trim().is_empty()
        {
            return Err(ConvertError::InvalidConfig(
                "external renderer program is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One backend tried on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAttempt {
    /// Backend tried
    pub backend: BackendKind,
    /// Whether it produced the output
    pub succeeded: bool,
    /// Why it failed
    pub error: Option<Failure>,
    /// Output written on success
    pub output_path: Option<PathBuf>,
    /// Wall-clock time spent
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl ConversionAttempt {
    fn success(backend: BackendKind, output: PathBuf, elapsed: Duration) -> Self {
        Self {
            backend,
            succeeded: true,
            error: None,
            output_path: Some(output),
            elapsed,
        }
    }

    fn failure(backend: BackendKind, error: Failure, elapsed: Duration) -> Self {
        Self {
            backend,
            succeeded: false,
            error: Some(error),
            output_path: None,
            elapsed,
        }
    }

    /// Failure classification, if the attempt failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Why a conversion produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum ChainFailure {
    /// No backend could be run at all
    #[display("NoBackendAvailable")]
    NoBackendAvailable,
    /// Every backend that ran failed
    #[display("AllBackendsFailed")]
    AllBackendsFailed,
    /// The source could not be read
    #[display("SourceUnreadable")]
    SourceUnreadable,
}

/// Result of converting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Source document
    pub source: PathBuf,
    /// Requested output format
    pub format: TargetFormat,
    /// Attempts in the order they were made
    pub attempts: Vec<ConversionAttempt>,
    /// Failure that prevented any attempt (unreadable source)
    pub source_error: Option<Failure>,
}

impl ConversionOutcome {
    fn new(source: &Path, format: TargetFormat) -> Self {
        Self {
            source: source.to_path_buf(),
            format,
            attempts: Vec::new(),
            source_error: None,
        }
    }

    /// Whether some attempt produced the output.
    pub fn succeeded(&self) -> bool {
        self.attempts.iter().any(|a| a.succeeded)
    }

    /// The last attempt made.
    pub fn final_attempt(&self) -> Option<&ConversionAttempt> {
        self.attempts.last()
    }

    /// Path of the output, on success.
    pub fn output_path(&self) -> Option<&Path> {
        self.attempts
            .iter()
            .find(|a| a.succeeded)
            .and_then(|a| a.output_path.as_deref())
    }

    /// Backend that produced the output, on success.
    pub fn backend(&self) -> Option<BackendKind> {
        self.attempts.iter().find(|a| a.succeeded).map(|a| a.backend)
    }

    /// Failure classification, or `None` on success.
    pub fn failure(&self) -> Option<ChainFailure> {
        if self.succeeded() {
            None
        } else if self.source_error.is_some() {
            Some(ChainFailure::SourceUnreadable)
        } else if self
            .attempts
            .iter()
            .all(|a| a.error_kind() == Some(ErrorKind::BackendUnavailable))
        {
            Some(ChainFailure::NoBackendAvailable)
        } else {
            Some(ChainFailure::AllBackendsFailed)
        }
    }
}

/// Ordered multi-backend converter.
#[derive(Debug)]
pub struct ConversionChain {
    settings: ChainSettings,
    external: ExternalRenderer,
    external_available: OnceCell<bool>,
}

impl ConversionChain {
    /// Build a chain after validating its settings.
    pub fn new(settings: ChainSettings) -> Result<Self> {
        settings.validate()?;
        let external = ExternalRenderer::new(settings.external_program.clone())
            .with_probe_timeout(settings.probe_timeout);
        Ok(Self {
            settings,
            external,
            external_available: OnceCell::new(),
        })
    }

    /// Settings in use.
    pub const fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Whether a backend can run here. The external probe runs at most once.
    pub async fn is_available(&self, backend: BackendKind) -> bool {
        match backend {
            BackendKind::Styled | BackendKind::Chunked | BackendKind::Html => true,
            BackendKind::External => {
                *self
                    .external_available
                    .get_or_init(|| self.external.probe())
                    .await
            }
        }
    }

    /// Convert `source` into `target` in the given format.
    ///
    /// Never fails: every problem is recorded in the returned outcome.
    pub async fn convert(
        &self,
        source: &Path,
        target: &Path,
        format: TargetFormat,
    ) -> ConversionOutcome {
        let mut outcome = ConversionOutcome::new(source, format);

        let info = match SourceInfo::probe(source) {
            Ok(info) => info,
            Err(e) => {
                warn!(path = %source.display(), error = %e, "cannot read source");
                outcome.source_error = Some(Failure::from(&e));
                return outcome;
            }
        };

        match format {
            TargetFormat::Pdf => self.convert_pdf(&info, target, &mut outcome).await,
            TargetFormat::Html => self.convert_html(&info, target, &mut outcome).await,
        }

        match outcome.failure() {
            None => info!(
                path = %source.display(),
                backend = %outcome.backend().map(|b| b.to_string()).unwrap_or_default(),
                "conversion succeeded"
            ),
            Some(failure) => warn!(
                path = %source.display(),
                %failure,
                attempts = outcome.attempts.len(),
                "conversion failed"
            ),
        }
        outcome
    }

    async fn convert_pdf(&self, info: &SourceInfo, target: &Path, outcome: &mut ConversionOutcome) {
        let backends = select_backends(
            &self.settings.backend_order,
            info.size,
            self.settings.size_threshold_bytes,
        );

        for backend in backends {
            let started = Instant::now();
            if !self.is_available(backend).await {
                info!(backend = %backend, "backend unavailable, skipping");
                outcome.attempts.push(ConversionAttempt::failure(
                    backend,
                    Failure::new(
                        ErrorKind::BackendUnavailable,
                        format!("{backend} backend is not available"),
                    ),
                    started.elapsed(),
                ));
                continue;
            }

            info!(backend = %backend, path = %info.path.display(), size = info.size, "attempt started");
            let attempt = self.attempt(backend, info, target).await;
            let elapsed = started.elapsed();
            match attempt {
                Ok(path) => {
                    info!(backend = %backend, elapsed_ms = elapsed.as_millis() as u64, "attempt succeeded");
                    outcome
                        .attempts
                        .push(ConversionAttempt::success(backend, path, elapsed));
                    return;
                }
                Err(e) => {
                    warn!(backend = %backend, kind = %e.kind(), error = %e, "attempt failed");
                    outcome
                        .attempts
                        .push(ConversionAttempt::failure(backend, Failure::from(&e), elapsed));
                }
            }
        }
    }

    /// Run one backend under the attempt timeout.
    async fn attempt(&self, backend: BackendKind, info: &SourceInfo, target: &Path) -> Result<PathBuf> {
        let abort = CancelFlag::new();
        let run = async {
            match backend {
                BackendKind::Styled => {
                    let (info, target, abort) = (info.clone(), target.to_path_buf(), abort.clone());
                    tokio::task::spawn_blocking(move || render_styled(&info, &target, &abort))
                        .await
                        .map_err(ConvertError::from)
                        .and_then(|r| r)
                }
                BackendKind::Chunked => {
                    let (info, target, abort) = (info.clone(), target.to_path_buf(), abort.clone());
                    let chunk = self.settings.chunk_size_bytes;
                    tokio::task::spawn_blocking(move || render_chunked(&info, &target, chunk, &abort))
                        .await
                        .map_err(ConvertError::from)
                        .and_then(|r| r)
                }
                BackendKind::External => self.external.render(info, target).await,
                BackendKind::Html => Err(ConvertError::InvalidConfig(
                    "html is not a PDF backend".to_string(),
                )),
            }
        };

        match tokio::time::timeout(self.settings.attempt_timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                // Blocking renderers cannot be interrupted; they see the flag
                // and discard their output.
                abort.cancel();
                Err(ConvertError::Timeout(self.settings.attempt_timeout))
            }
        }
    }

    async fn convert_html(&self, info: &SourceInfo, target: &Path, outcome: &mut ConversionOutcome) {
        let started = Instant::now();
        let (source, dest) = (info.path.clone(), target.to_path_buf());
        let run = tokio::task::spawn_blocking(move || convert_to_html(&source, &dest));
        let result = match tokio::time::timeout(self.settings.attempt_timeout, run).await {
            Ok(joined) => joined.map_err(ConvertError::from).and_then(|r| r),
            Err(_) => Err(ConvertError::Timeout(self.settings.attempt_timeout)),
        };
        let elapsed = started.elapsed();
        outcome.attempts.push(match result {
            Ok(path) => ConversionAttempt::success(BackendKind::Html, path, elapsed),
            Err(e) => ConversionAttempt::failure(BackendKind::Html, Failure::from(&e), elapsed),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attempt(kind: ErrorKind) -> ConversionAttempt {
        ConversionAttempt::failure(
            BackendKind::External,
            Failure::new(kind, "x"),
            Duration::ZERO,
        )
    }

    #[rstest]
    #[case(vec![ErrorKind::BackendUnavailable], ChainFailure::NoBackendAvailable)]
    #[case(vec![ErrorKind::BackendUnavailable, ErrorKind::Render], ChainFailure::AllBackendsFailed)]
    #[case(vec![ErrorKind::Render, ErrorKind::Io], ChainFailure::AllBackendsFailed)]
    fn test_failure_classification(#[case] kinds: Vec<ErrorKind>, #[case] expected: ChainFailure) {
        let mut outcome = ConversionOutcome::new(Path::new("a.txt"), TargetFormat::Pdf);
        outcome.attempts = kinds.into_iter().map(attempt).collect();
        assert_eq!(outcome.failure(), Some(expected));
        assert!(outcome.output_path().is_none());
    }

    #[test]
    fn test_success_has_no_failure() {
        let mut outcome = ConversionOutcome::new(Path::new("a.txt"), TargetFormat::Pdf);
        outcome.attempts.push(attempt(ErrorKind::BackendUnavailable));
        outcome.attempts.push(ConversionAttempt::success(
            BackendKind::Chunked,
            PathBuf::from("a.pdf"),
            Duration::ZERO,
        ));
        assert_eq!(outcome.failure(), None);
        assert_eq!(outcome.backend(), Some(BackendKind::Chunked));
        assert_eq!(outcome.output_path(), Some(Path::new("a.pdf")));
    }

    #[rstest]
    #[case("data/AAPL/x.htm", TargetFormat::Pdf, None, "data/AAPL/x.pdf")]
    #[case("data/AAPL/x.txt", TargetFormat::Html, None, "data/AAPL/x.html")]
    #[case("data/AAPL/x.txt", TargetFormat::Pdf, Some("out"), "out/x.pdf")]
    fn test_output_path(
        #[case] source: &str,
        #[case] format: TargetFormat,
        #[case] dir: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            output_path(Path::new(source), format, dir.map(Path::new)),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    #[case(ChainSettings { backend_order: vec![], ..ChainSettings::default() })]
    #[case(ChainSettings { chunk_size_bytes: 0, ..ChainSettings::default() })]
    #[case(ChainSettings { backend_order: vec![BackendKind::Html], ..ChainSettings::default() })]
    #[case(ChainSettings { external_program: " ".into(), ..ChainSettings::default() })]
    fn test_invalid_settings(#[case] settings: ChainSettings) {
        assert!(matches!(
            ConversionChain::new(settings),
            Err(ConvertError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_source() {
        let chain = ConversionChain::new(ChainSettings::default()).unwrap();
        let outcome = chain
            .convert(
                Path::new("/no/such/file.txt"),
                Path::new("/tmp/never.pdf"),
                TargetFormat::Pdf,
            )
            .await;
        assert_eq!(outcome.failure(), Some(ChainFailure::SourceUnreadable));
        assert!(outcome.attempts.is_empty());
    }
}
