//! Shared HTTP transport for scrapers.
//!
//! Every outbound request goes through [`HttpClient`]: the URL guard runs
//! first, then the request is sent with browser-like headers and retried
//! with bounded exponential backoff on transport errors and 5xx responses.
//! Retry lives only at this layer; adapters and coordinators never re-issue
//! requests themselves.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
    HTTP_BACKOFF_MAX, HTTP_BACKOFF_MIN, HTTP_MAX_ATTEMPTS,
};
use crate::error::{Error, Result};
use crate::url_guard::UrlGuard;

/// HTTP client wrapper with SSRF checks, negotiated language headers, and
/// retry.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    guard: UrlGuard,
}

impl HttpClient {
    /// Build a client with the default `zh-TW` language preference.
    pub fn new() -> Result<Self> {
        Self::with_language("zh-TW")
    }

    /// Build a client negotiating `language` via `Accept-Language`.
    pub fn with_language(language: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let accept_language = format!("{language},zh;q=0.9,en-US;q=0.8,en;q=0.7");
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&accept_language)
                .unwrap_or_else(|_| HeaderValue::from_static("zh-TW,zh;q=0.9,en;q=0.7")),
        );

        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .timeout(DEFAULT_HTTP_REQUEST_TIMEOUT)
            .connect_timeout(DEFAULT_HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::adapter_transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            guard: UrlGuard::default(),
        })
    }

    /// Replace the URL guard. Tests use this to point at local fixtures.
    #[must_use]
    pub fn with_guard(mut self, guard: UrlGuard) -> Self {
        self.guard = guard;
        self
    }

    fn backoff(attempt: u32) -> Duration {
        let exp = HTTP_BACKOFF_MIN.saturating_mul(1 << attempt.min(8));
        exp.min(HTTP_BACKOFF_MAX)
    }

    async fn execute(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Response> {
        let mut last_error = String::new();

        for attempt in 0..HTTP_MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = Self::backoff(attempt - 1);
                debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(url.clone());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = format!("HTTP {status} from {url}");
                        warn!(url = %url, %status, attempt, "server error, will retry");
                        continue;
                    }
                    return Err(Error::adapter_transport(format!("HTTP {status} from {url}")));
                }
                Err(e) => {
                    last_error = format!("request to {url} failed: {e}");
                    warn!(url = %url, error = %e, attempt, "transport error, will retry");
                }
            }
        }

        Err(Error::adapter_transport(last_error))
    }

    /// GET `url` after guard validation.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let parsed = self.guard.validate_str(url)?;
        self.execute(&parsed, &[]).await
    }

    /// GET with extra per-request headers (API keys, cookies).
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Response> {
        let parsed = self.guard.validate_str(url)?;
        self.execute(&parsed, headers).await
    }

    /// GET with a `Cookie` header.
    pub async fn get_with_cookie(&self, url: &str, cookie: &str) -> Result<Response> {
        self.get_with_headers(url, &[(COOKIE.as_str(), cookie)])
            .await
    }

    /// GET and read the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| Error::adapter_transport(format!("failed to read body from {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_bounded() {
        assert_eq!(HttpClient::backoff(0), Duration::from_secs(1));
        assert_eq!(HttpClient::backoff(1), Duration::from_secs(2));
        assert_eq!(HttpClient::backoff(2), Duration::from_secs(4));
        assert_eq!(HttpClient::backoff(6), Duration::from_secs(10));
        assert_eq!(HttpClient::backoff(30), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_get_rejects_guarded_url_before_sending() {
        let client = HttpClient::new().unwrap();
        let err = client.get("http://127.0.0.1/metadata").await.unwrap_err();
        assert!(matches!(err, Error::UrlNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_get_rejects_non_http_scheme() {
        let client = HttpClient::new().unwrap();
        let err = client.get("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::UrlNotAllowed(_)));
    }

    #[test]
    fn test_with_language_builds() {
        assert!(HttpClient::with_language("en-US").is_ok());
        assert!(HttpClient::with_language("zh-TW").is_ok());
    }
}
