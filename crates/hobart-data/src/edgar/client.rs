//! SEC EDGAR registry client with rate limiting and retries.

use crate::edgar::filings::{
    AccessionNumber, FilingColumns, FilingRecord, FormType, Submissions, sort_filings,
};
use crate::edgar::tickers::{CompanyRecord, TickerCache};
use crate::edgar::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::error::{DataError, Result};
use crate::rate_limit::{DEFAULT_RATE_LIMIT, SharedRateLimiter};
use crate::retry::{RetryPolicy, run_with_retry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Host serving the ticker mapping.
pub const DEFAULT_BASE_URL: &str = "https://www.sec.gov";

/// Host serving the submissions API.
pub const DEFAULT_API_URL: &str = "https://data.sec.gov";

/// Root of the filing archives.
pub const DEFAULT_DOCUMENTS_URL: &str = "https://www.sec.gov/Archives/edgar";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry endpoint roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    /// Root serving `files/company_tickers.json`
    pub base_url: String,
    /// Root serving `submissions/CIK##########.json`
    pub api_url: String,
    /// Root of the `data/{cik}/{accession}/{document}` archive
    pub documents_url: String,
}

impl RegistryEndpoints {
    fn tickers_url(&self) -> String {
        format!("{}/files/company_tickers.json", trim(&self.base_url))
    }

    fn submissions_url(&self, cik: &str) -> String {
        format!(
            "{}/submissions/CIK{}.json",
            trim(&self.api_url),
            TickerCache::pad_cik(cik)
        )
    }

    fn index_page_url(&self, name: &str) -> String {
        format!("{}/submissions/{}", trim(&self.api_url), name)
    }

    fn document_url(&self, cik: &str, accession: &AccessionNumber, document: &str) -> String {
        format!(
            "{}/data/{}/{}/{}",
            trim(&self.documents_url),
            TickerCache::unpad_cik(cik),
            accession.without_dashes(),
            document
        )
    }
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            documents_url: DEFAULT_DOCUMENTS_URL.to_string(),
        }
    }
}

fn trim(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Everything the client needs to reach the registry politely.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Endpoint roots
    pub endpoints: RegistryEndpoints,
    /// Identifying `User-Agent` (the SEC requires a contact e-mail)
    pub user_agent: String,
    /// Minimum spacing between requests
    pub rate_limit: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retry policy for transport failures and throttling
    pub retry: RetryPolicy,
}

impl RegistrySettings {
    /// Settings with defaults and the given identifying header.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            endpoints: RegistryEndpoints::default(),
            user_agent: user_agent.into(),
            rate_limit: DEFAULT_RATE_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Check that an identifying header is usable before any request is made.
///
/// The value must be non-empty printable ASCII and carry a contact e-mail.
pub fn validate_user_agent(user_agent: &str) -> Result<()> {
    let value = user_agent.trim();
    if value.is_empty() {
        return Err(DataError::InvalidConfig(
            "identifying User-Agent header is missing".to_string(),
        ));
    }
    if !value.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(DataError::InvalidConfig(format!(
            "User-Agent {:?} contains non-printable or non-ASCII characters",
            user_agent
        )));
    }
    let has_contact = value.split_whitespace().any(|word| {
        word.split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
    });
    if !has_contact {
        return Err(DataError::InvalidConfig(format!(
            "User-Agent {:?} must include a contact e-mail address",
            user_agent
        )));
    }
    Ok(())
}

/// Rate-limited client for the SEC EDGAR registry.
///
/// Owns the ticker snapshot: it is fetched on first use and replaced only by
/// an explicit [`refresh`](Self::refresh).
pub struct RegistryClient {
    transport: Arc<dyn Transport>,
    limiter: SharedRateLimiter,
    retry: RetryPolicy,
    endpoints: RegistryEndpoints,
    tickers: Mutex<Option<Arc<TickerCache>>>,
}

impl RegistryClient {
    /// Create a client using the production HTTP transport.
    ///
    /// # Errors
    /// Returns `DataError::InvalidConfig` if the identifying header is unusable.
    pub fn new(settings: RegistrySettings) -> Result<Self> {
        validate_user_agent(&settings.user_agent)?;
        let transport = ReqwestTransport::new(settings.user_agent.trim(), settings.request_timeout)?;
        Self::with_transport(Arc::new(transport), settings)
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, settings: RegistrySettings) -> Result<Self> {
        validate_user_agent(&settings.user_agent)?;
        Ok(Self {
            transport,
            limiter: SharedRateLimiter::new(settings.rate_limit),
            retry: settings.retry,
            endpoints: settings.endpoints,
            tickers: Mutex::new(None),
        })
    }

    /// Endpoint roots in use.
    pub const fn endpoints(&self) -> &RegistryEndpoints {
        &self.endpoints
    }

    /// The ticker snapshot, fetching it on first use.
    pub async fn ticker_cache(&self) -> Result<Arc<TickerCache>> {
        let mut slot = self.tickers.lock().await;
        if let Some(cache) = slot.as_ref() {
            return Ok(Arc::clone(cache));
        }
        let cache = Arc::new(self.fetch_tickers().await?);
        *slot = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Replace the ticker snapshot with a fresh copy from the registry.
    ///
    /// The previous snapshot is kept if the fetch fails.
    pub async fn refresh(&self) -> Result<Arc<TickerCache>> {
        let mut slot = self.tickers.lock().await;
        let cache = Arc::new(self.fetch_tickers().await?);
        *slot = Some(Arc::clone(&cache));
        Ok(cache)
    }

    async fn fetch_tickers(&self) -> Result<TickerCache> {
        let response = self.get(&self.endpoints.tickers_url()).await?;
        let cache = TickerCache::from_json(&response.body)?;
        info!(companies = cache.len(), "loaded ticker snapshot");
        Ok(cache)
    }

    /// Resolve a ticker symbol (case-insensitive) to its company record.
    ///
    /// # Errors
    /// Returns `DataError::CikNotFound` if the ticker is empty or unknown.
    pub async fn resolve_ticker(&self, ticker: &str) -> Result<CompanyRecord> {
        if ticker.trim().is_empty() {
            return Err(DataError::CikNotFound(ticker.to_string()));
        }
        let cache = self.ticker_cache().await?;
        cache
            .get(ticker)
            .cloned()
            .ok_or_else(|| DataError::CikNotFound(ticker.trim().to_uppercase()))
    }

    /// Companies in the snapshot matching `term`, sorted by ticker.
    pub async fn search(&self, term: &str, limit: usize) -> Result<Vec<CompanyRecord>> {
        let cache = self.ticker_cache().await?;
        Ok(cache.search(term, limit).into_iter().cloned().collect())
    }

    /// Every company in the snapshot, sorted by ticker.
    pub async fn companies(&self) -> Result<Vec<CompanyRecord>> {
        self.search("", usize::MAX).await
    }

    /// List a company's filings of the given form types, newest first.
    ///
    /// An empty `form_types` slice matches every form. Older index pages are
    /// only fetched while fewer than `max_count` matches have been found.
    pub async fn list_filings(
        &self,
        cik: &str,
        form_types: &[FormType],
        max_count: usize,
    ) -> Result<Vec<FilingRecord>> {
        if cik.trim().is_empty() {
            return Err(DataError::CikNotFound("empty CIK".to_string()));
        }
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let response = self.get(&self.endpoints.submissions_url(cik)).await?;
        let submissions: Submissions = serde_json::from_slice(&response.body)?;

        let mut records = submissions.filings.recent.records(form_types);
        for page in &submissions.filings.files {
            if records.len() >= max_count {
                break;
            }
            debug!(cik, page = %page.name, "fetching older filings page");
            let response = self.get(&self.endpoints.index_page_url(&page.name)).await?;
            let columns: FilingColumns = serde_json::from_slice(&response.body)?;
            records.extend(columns.records(form_types));
        }

        let mut seen = HashSet::new();
        records.retain(|r| seen.insert(r.accession_number.clone()));
        sort_filings(&mut records);
        records.truncate(max_count);

        debug!(cik, count = records.len(), "listed filings");
        Ok(records)
    }

    /// Fetch one document of a filing.
    ///
    /// # Errors
    /// `DataError::NotFound` when the document has moved or been removed.
    pub async fn fetch_document(
        &self,
        cik: &str,
        accession: &AccessionNumber,
        document: &str,
    ) -> Result<Vec<u8>> {
        if document.trim().is_empty() {
            return Err(DataError::NotFound(format!(
                "empty document name in {}",
                accession
            )));
        }
        let url = self.endpoints.document_url(cik, accession, document.trim());
        let response = self.get(&url).await?;
        Ok(response.body)
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        run_with_retry(&self.retry, url, |attempt| async move {
            self.limiter.acquire().await;
            debug!(url, attempt, "registry request");
            self.transport.get(url).await?.error_for_status(url)
        })
        .await
    }
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("endpoints", &self.endpoints)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Jane Analyst jane@example.com", true)]
    #[case("jane@example.com", true)]
    #[case("", false)]
    #[case("   ", false)]
    #[case("Jane Analyst", false)]
    #[case("jane@localhost", false)]
    #[case("Jane\u{7} jane@example.com", false)]
    fn test_validate_user_agent(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(validate_user_agent(value).is_ok(), ok);
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = RegistryEndpoints::default();
        assert_eq!(
            endpoints.tickers_url(),
            "https://www.sec.gov/files/company_tickers.json"
        );
        assert_eq!(
            endpoints.submissions_url("320193"),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
        let acc = AccessionNumber::parse("0000320193-23-000106").unwrap();
        assert_eq!(
            endpoints.document_url("0000320193", &acc, "aapl-20230930.htm"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/aapl-20230930.htm"
        );
    }

    #[test]
    fn test_trailing_slashes_are_ignored() {
        let endpoints = RegistryEndpoints {
            base_url: "http://localhost:8080/".to_string(),
            api_url: "http://localhost:8080/api/".to_string(),
            documents_url: "http://localhost:8080/docs/".to_string(),
        };
        assert_eq!(
            endpoints.index_page_url("CIK0000320193-submissions-001.json"),
            "http://localhost:8080/api/submissions/CIK0000320193-submissions-001.json"
        );
    }

    #[test]
    fn test_new_rejects_bad_user_agent() {
        let result = RegistryClient::new(RegistrySettings::new("no contact here"));
        assert!(matches!(result, Err(DataError::InvalidConfig(_))));
    }
}
