//! HTTP transport used by the registry client.
//!
//! The client talks to the registry through the [`Transport`] trait so that
//! request pacing, retries and status classification can be exercised
//! without a network.

use crate::error::{DataError, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
    /// Parsed `Retry-After` header (seconds form only)
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, body)
    }

    /// A response with the given status and body.
    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    /// Whether the status is in the 2xx range.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Map non-success statuses onto the error taxonomy.
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        match self.status {
            _ if self.is_success() => Ok(self),
            404 | 410 => Err(DataError::NotFound(url.to_string())),
            429 => Err(DataError::RateLimited {
                retry_after: self.retry_after,
            }),
            status => Err(DataError::HttpStatus {
                status,
                url: url.to_string(),
            }),
        }
    }
}

/// Something that can perform an HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Fetch `url`, returning the response whatever its status.
    ///
    /// Errors are reserved for transport-level failures.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport sending `user_agent` on every request.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(DataError::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, None)]
    #[case(204, None)]
    #[case(404, Some(crate::error::ErrorKind::NotFound))]
    #[case(429, Some(crate::error::ErrorKind::RateLimited))]
    #[case(500, Some(crate::error::ErrorKind::Network))]
    fn test_error_for_status(
        #[case] status: u16,
        #[case] expected: Option<crate::error::ErrorKind>,
    ) {
        let result = HttpResponse::with_status(status, "").error_for_status("https://example");
        assert_eq!(result.err().map(|e| e.kind()), expected);
    }

    #[test]
    fn test_retry_after_is_carried() {
        let mut response = HttpResponse::with_status(429, "slow down");
        response.retry_after = Some(Duration::from_secs(3));
        let err = response.error_for_status("u").unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }
}
