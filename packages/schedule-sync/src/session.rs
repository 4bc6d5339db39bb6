//! Cookie-bearing HTTP session with bounded retries.
//!
//! One [`HttpSession`] is created per run and threaded through every network
//! call, so the cookie jar picked up on the entry page is carried into the
//! listing and detail requests and dropped when the run ends.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{Quota, RateLimiter};
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::Html;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult, Result, SyncError};
use crate::types::config::HttpConfig;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// Body encoding for POST requests (`enctype`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormEncoding {
    #[default]
    UrlEncoded,
    Multipart,
    TextPlain,
}

impl FormEncoding {
    pub fn from_enctype(enctype: Option<&str>) -> Self {
        match enctype.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
            Some("multipart/form-data") => FormEncoding::Multipart,
            Some("text/plain") => FormEncoding::TextPlain,
            _ => FormEncoding::UrlEncoded,
        }
    }
}

/// A request the session knows how to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    /// GET: appended as query. POST: sent as the body.
    pub fields: Vec<(String, String)>,
    pub encoding: FormEncoding,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            fields: Vec::new(),
            encoding: FormEncoding::UrlEncoded,
        }
    }

    pub fn post(url: Url, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url,
            fields,
            encoding: FormEncoding::UrlEncoded,
        }
    }

    pub fn with_encoding(mut self, encoding: FormEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// A fetched HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl Document {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            body: body.into(),
        }
    }

    /// Parse the body. `Html` is not `Send`, so keep it out of await points.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Anything that can turn a request into a document.
///
/// Implementations own retry policy; callers see only the final outcome.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<Document>;

    /// Convenience GET.
    async fn get(&self, url: &Url) -> FetchResult<Document> {
        self.fetch(&FetchRequest::get(url.clone())).await
    }
}

/// Production session: reqwest client with a cookie jar, pacing and backoff.
pub struct HttpSession {
    client: reqwest::Client,
    backoff: ExponentialBuilder,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl HttpSession {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.max_backoff_ms))
            .with_max_times(config.max_attempts.saturating_sub(1))
            .with_jitter();

        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            backoff,
            limiter,
        })
    }

    async fn send_once(&self, request: &FetchRequest) -> FetchResult<Document> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let url = request.url.as_str();
        debug!(method = ?request.method, url = %url, fields = request.fields.len(), "HTTP request");

        let builder = match request.method {
            Method::Get => {
                let builder = self.client.get(request.url.clone());
                if request.fields.is_empty() {
                    builder
                } else {
                    builder.query(&request.fields)
                }
            }
            Method::Post => {
                let builder = self.client.post(request.url.clone());
                match request.encoding {
                    FormEncoding::UrlEncoded => builder.form(&request.fields),
                    FormEncoding::Multipart => {
                        let form = request
                            .fields
                            .iter()
                            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                                form.text(name.clone(), value.clone())
                            });
                        builder.multipart(form)
                    }
                    FormEncoding::TextPlain => {
                        let body: String = request
                            .fields
                            .iter()
                            .map(|(name, value)| format!("{name}={value}\r\n"))
                            .collect();
                        builder
                            .header(header::CONTENT_TYPE, "text/plain")
                            .body(body)
                    }
                }
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        debug!(url = %final_url, status = status.as_u16(), bytes = body.len(), "HTTP response");

        Ok(Document {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpSession {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<Document> {
        let attempt = || self.send_once(request);

        attempt
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(|err: &FetchError| err.is_retryable())
            .notify(|err: &FetchError, delay: Duration| {
                warn!(
                    url = %request.url,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "retrying request"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_enctype() {
        assert_eq!(FormEncoding::from_enctype(None), FormEncoding::UrlEncoded);
        assert_eq!(
            FormEncoding::from_enctype(Some("Multipart/Form-Data")),
            FormEncoding::Multipart
        );
        assert_eq!(
            FormEncoding::from_enctype(Some("text/plain")),
            FormEncoding::TextPlain
        );
        assert_eq!(
            FormEncoding::from_enctype(Some("bogus")),
            FormEncoding::UrlEncoded
        );
    }

    #[test]
    fn test_retry_policy() {
        let status = |status| FetchError::HttpStatus {
            url: "u".into(),
            status,
        };
        assert!(status(503).is_retryable());
        assert!(!status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(FetchError::Timeout { url: "u".into() }.is_retryable());
        assert!(!FetchError::InvalidUrl { url: "u".into() }.is_retryable());
    }

    #[test]
    fn test_session_builds_with_defaults() {
        assert!(HttpSession::new(&HttpConfig::default()).is_ok());
    }
}
