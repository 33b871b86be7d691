//! Run configuration.
//!
//! Loaded from YAML with every field optional; missing fields take the
//! defaults below. The configuration is read once per run and never changes
//! afterwards.
//!
//! ```yaml
//! sec:
//!   user_agent: "Jane Analyst jane@example.com"
//!   rate_limit_delay: 0.1
//! download:
//!   output_dir: data/reports
//!   form_types: [10-K, 10-Q]
//! conversion:
//!   backend_order: [styled, external, chunked]
//! ```

use crate::error::ConfigError;
use hobart_convert::{BackendKind, ChainSettings, TargetFormat};
use hobart_data::atomic::write_atomic;
use hobart_data::edgar::{
    FormType, RegistryEndpoints, RegistrySettings, validate_user_agent,
};
use hobart_data::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file looked up relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = "config/config.yaml";

/// Name of the per-user config directory.
pub const APP_DIR: &str = "hobart";

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry access
    pub sec: SecConfig,
    /// Download behavior
    pub download: DownloadConfig,
    /// Conversion chain
    pub conversion: ConversionConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Registry access settings. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecConfig {
    /// Host serving the ticker map
    pub base_url: String,
    /// Host serving the submissions API
    pub api_url: String,
    /// Root of the filing archives
    pub documents_url: String,
    /// Identifying `User-Agent`; must contain a contact e-mail
    pub user_agent: String,
    /// Minimum spacing between requests
    pub rate_limit_delay: f64,
    /// Per-request timeout
    pub request_timeout: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay, doubled on every retry
    pub backoff_base: f64,
}

impl Default for SecConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.sec.gov".to_string(),
            api_url: "https://data.sec.gov".to_string(),
            documents_url: "https://www.sec.gov/Archives/edgar".to_string(),
            user_agent: "Hobart hobart@example.com".to_string(),
            rate_limit_delay: 0.1,
            request_timeout: 30.0,
            max_retries: 4,
            backoff_base: 0.5,
        }
    }
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root of the `TICKER/TICKER_<date>_<form>.<ext>` tree
    pub output_dir: PathBuf,
    /// Form types to fetch
    pub form_types: Vec<FormType>,
    /// Most recent filings fetched per ticker
    pub max_reports_per_company: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/reports"),
            form_types: vec![FormType::TenK, FormType::TenQ],
            max_reports_per_company: 5,
        }
    }
}

/// Conversion settings. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Output format of conversions
    pub output_format: TargetFormat,
    /// Sources at or above this size skip the styled renderer
    pub size_threshold_bytes: u64,
    /// Chunk size of the chunked renderer
    pub chunk_size_bytes: usize,
    /// PDF backends in the order they are tried
    pub backend_order: Vec<BackendKind>,
    /// External renderer program
    pub external_program: String,
    /// Wall-clock budget per backend attempt
    pub attempt_timeout: f64,
    /// Budget for the external renderer's `--version` probe
    pub probe_timeout: f64,
    /// Documents converted at the same time
    pub concurrency: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        let chain = ChainSettings::default();
        Self {
            output_format: TargetFormat::Pdf,
            size_threshold_bytes: chain.size_threshold_bytes,
            chunk_size_bytes: chain.chunk_size_bytes,
            backend_order: chain.backend_order,
            external_program: chain.external_program,
            attempt_timeout: chain.attempt_timeout.as_secs_f64(),
            probe_timeout: chain.probe_timeout.as_secs_f64(),
            concurrency: 2,
        }
    }
}

/// Log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Append-only log file, in addition to stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("data/logs/hobart.log")),
        }
    }
}

impl Config {
    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Per-user config file, e.g. `~/.config/hobart/config.yaml`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
    }

    /// Locate and load the configuration.
    ///
    /// An explicit path must exist. Otherwise `./config/config.yaml` and the
    /// per-user file are tried in turn, falling back to the defaults. Returns
    /// the file that was loaded, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG_PATH))
            .chain(Self::user_config_path());
        for path in candidates {
            if path.is_file() {
                debug!(path = %path.display(), "loading config");
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        debug!("no config file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Check every setting whose failure would be fatal to a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_user_agent(&self.sec.user_agent)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for (name, url) in [
            ("sec.base_url", &self.sec.base_url),
            ("sec.api_url", &self.sec.api_url),
            ("sec.documents_url", &self.sec.documents_url),
        ] {
            validate_url(name, url)?;
        }

        validate_seconds("sec.rate_limit_delay", self.sec.rate_limit_delay, true)?;
        validate_seconds("sec.request_timeout", self.sec.request_timeout, false)?;
        validate_seconds("sec.backoff_base", self.sec.backoff_base, true)?;
        validate_seconds("conversion.attempt_timeout", self.conversion.attempt_timeout, false)?;
        validate_seconds("conversion.probe_timeout", self.conversion.probe_timeout, false)?;

        if self.download.max_reports_per_company == 0 {
            return Err(ConfigError::Invalid(
                "download.max_reports_per_company must be positive".to_string(),
            ));
        }
        if self.conversion.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "conversion.concurrency must be positive".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level is empty".to_string()));
        }

        self.chain_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_yaml::to_string(self)?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    /// Look up a value by dotted key, e.g. `sec.user_agent`.
    pub fn get(&self, key: &str) -> Option<serde_yaml::Value> {
        let mut value = serde_yaml::to_value(self).ok()?;
        for part in key.split('.') {
            value = value.get(part)?.clone();
        }
        Some(value)
    }

    /// Settings for the registry client.
    pub fn registry_settings(&self) -> RegistrySettings {
        let mut settings = RegistrySettings::new(self.sec.user_agent.trim());
        settings.endpoints = RegistryEndpoints {
            base_url: self.sec.base_url.clone(),
            api_url: self.sec.api_url.clone(),
            documents_url: self.sec.documents_url.clone(),
        };
        settings.rate_limit = seconds(self.sec.rate_limit_delay);
        settings.request_timeout = seconds(self.sec.request_timeout);
        settings.retry = RetryPolicy::new(self.sec.max_retries, seconds(self.sec.backoff_base));
        settings
    }

    /// Settings for the conversion chain.
    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            backend_order: self.conversion.backend_order.clone(),
            size_threshold_bytes: self.conversion.size_threshold_bytes,
            chunk_size_bytes: self.conversion.chunk_size_bytes,
            attempt_timeout: seconds(self.conversion.attempt_timeout),
            external_program: self.conversion.external_program.clone(),
            probe_timeout: seconds(self.conversion.probe_timeout),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn validate_seconds(name: &str, value: f64, zero_ok: bool) -> Result<(), ConfigError> {
    let valid = value.is_finite() && (value > 0.0 || (zero_ok && value == 0.0));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be a {} number of seconds, got {value}",
            if zero_ok { "non-negative" } else { "positive" }
        )))
    }
}

fn validate_url(name: &str, url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.trim_matches('/').is_empty() && !host.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(ConfigError::Invalid(format!(
            "{name} is not an http(s) URL: {url:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sec.base_url, "https://www.sec.gov");
        assert_eq!(config.sec.api_url, "https://data.sec.gov");
        assert_eq!(config.download.output_dir, PathBuf::from("data/reports"));
        assert_eq!(
            config.download.form_types,
            vec![FormType::TenK, FormType::TenQ]
        );
        assert_eq!(config.download.max_reports_per_company, 5);
        assert_eq!(config.conversion.output_format, TargetFormat::Pdf);
        assert_eq!(config.conversion.size_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.conversion.backend_order,
            vec![BackendKind::Styled, BackendKind::External, BackendKind::Chunked]
        );
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "sec:\n  user_agent: test@example.com\n  rate_limit_delay: 0.5\n\
             download:\n  output_dir: test_reports\n  max_reports_per_company: 10\n",
        )
        .unwrap();
        assert_eq!(config.sec.user_agent, "test@example.com");
        assert_eq!(config.sec.rate_limit_delay, 0.5);
        assert_eq!(config.sec.base_url, "https://www.sec.gov");
        assert_eq!(config.download.output_dir, PathBuf::from("test_reports"));
        assert_eq!(config.download.max_reports_per_company, 10);
        assert_eq!(config.conversion, ConversionConfig::default());
    }

    #[test]
    fn test_form_types_and_backends_parse() {
        let config = Config::from_yaml(
            "download:\n  form_types: [10-k, 8-K, S-1]\n\
             conversion:\n  backend_order: [chunked, external]\n  output_format: html\n",
        )
        .unwrap();
        assert_eq!(
            config.download.form_types,
            vec![FormType::TenK, FormType::EightK, FormType::Other("S-1".into())]
        );
        assert_eq!(
            config.conversion.backend_order,
            vec![BackendKind::Chunked, BackendKind::External]
        );
        assert_eq!(config.conversion.output_format, TargetFormat::Html);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[rstest]
    #[case::empty_agent("sec:\n  user_agent: ''\n")]
    #[case::agent_without_email("sec:\n  user_agent: 'just a name'\n")]
    #[case::bad_url("sec:\n  api_url: 'data.sec.gov'\n")]
    #[case::negative_delay("sec:\n  rate_limit_delay: -1\n")]
    #[case::zero_timeout("sec:\n  request_timeout: 0\n")]
    #[case::zero_chunk("conversion:\n  chunk_size_bytes: 0\n")]
    #[case::empty_order("conversion:\n  backend_order: []\n")]
    #[case::html_backend("conversion:\n  backend_order: [styled, html]\n")]
    #[case::zero_concurrency("conversion:\n  concurrency: 0\n")]
    #[case::zero_max("download:\n  max_reports_per_company: 0\n")]
    fn test_validate_rejects(#[case] yaml: &str) {
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        assert!(Config::from_yaml("conversion:\n  backend_order: [laser]\n").is_err());
    }

    #[test]
    fn test_get_dotted_key() {
        let config = Config::default();
        assert_eq!(
            config.get("sec.base_url"),
            Some(serde_yaml::Value::from("https://www.sec.gov"))
        );
        assert_eq!(
            config.get("download.max_reports_per_company"),
            Some(serde_yaml::Value::from(5))
        );
        assert_eq!(config.get("sec.nonexistent"), None);
        assert_eq!(config.get("nonexistent.key"), None);
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        let registry = config.registry_settings();
        assert_eq!(registry.rate_limit, Duration::from_millis(100));
        assert_eq!(registry.retry.max_attempts, 5);
        assert_eq!(registry.retry.base_delay, Duration::from_millis(500));

        let chain = config.chain_settings();
        assert_eq!(chain, ChainSettings::default());
    }
}
