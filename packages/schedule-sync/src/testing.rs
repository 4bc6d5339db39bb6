//! Testing utilities including mock implementations.
//!
//! These let the pipeline run against canned pages without touching the
//! network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, Result, SyncError};
use crate::pipeline::CalendarSink;
use crate::session::{Document, FetchRequest, Fetcher};
use crate::types::event::CanonicalEvent;

/// A mock fetcher serving predefined pages by URL.
///
/// Unknown URLs answer with HTTP 404. Query strings are ignored when
/// matching, so a GET form replay hits the page registered for its action.
#[derive(Default, Clone)]
pub struct MockFetcher {
    /// Page bodies by URL
    pages: Arc<RwLock<HashMap<String, String>>>,

    /// Failures by URL
    failures: Arc<RwLock<HashMap<String, MockFailure>>>,

    /// Response delays by URL
    delays: Arc<RwLock<HashMap<String, Duration>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<FetchRequest>>>,
}

/// A failure the mock can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Status(u16),
    Timeout,
    ConnectionRefused,
}

impl MockFailure {
    fn to_error(self, url: &str) -> FetchError {
        let url = url.to_string();
        match self {
            MockFailure::Status(status) => FetchError::HttpStatus { url, status },
            MockFailure::Timeout => FetchError::Timeout { url },
            MockFailure::ConnectionRefused => FetchError::Network {
                url,
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Mock connection refused",
                )),
            },
        }
    }
}

fn key(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

fn parse_key(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| key(&u))
        .unwrap_or_else(|_| url.to_string())
}

impl MockFetcher {
    /// Create a new mock fetcher with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(self, url: impl AsRef<str>, body: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(parse_key(url.as_ref()), body.into());
        self
    }

    /// Fail every request for `url`.
    pub fn with_failure(self, url: impl AsRef<str>, failure: MockFailure) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(parse_key(url.as_ref()), failure);
        self
    }

    /// Wait `delay` before answering any request for `url`.
    pub fn with_delay(self, url: impl AsRef<str>, delay: Duration) -> Self {
        self.delays
            .write()
            .unwrap()
            .insert(parse_key(url.as_ref()), delay);
        self
    }

    /// Fail every request for `url` with the given error's kind.
    pub fn with_error(self, url: impl AsRef<str>, error: FetchError) -> Self {
        let failure = match error {
            FetchError::HttpStatus { status, .. } => MockFailure::Status(status),
            FetchError::Timeout { .. } => MockFailure::Timeout,
            FetchError::Network { .. } | FetchError::InvalidUrl { .. } => {
                MockFailure::ConnectionRefused
            }
        };
        self.with_failure(url, failure)
    }

    /// Get all requests made to this mock.
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Requests made for `url`, ignoring the query string.
    pub fn calls_to(&self, url: &str) -> usize {
        let wanted = parse_key(url);
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|req| key(&req.url) == wanted)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<Document> {
        self.calls.write().unwrap().push(request.clone());

        let k = key(&request.url);
        let delay = self.delays.read().unwrap().get(&k).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.read().unwrap().get(&k) {
            return Err(failure.to_error(request.url.as_str()));
        }

        self.pages
            .read()
            .unwrap()
            .get(&k)
            .map(|body| Document::new(request.url.clone(), body.clone()))
            .ok_or_else(|| FetchError::HttpStatus {
                url: request.url.to_string(),
                status: 404,
            })
    }
}

/// A sink that keeps every published batch in memory.
#[derive(Default, Clone)]
pub struct RecordingSink {
    published: Arc<RwLock<Vec<Vec<CanonicalEvent>>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every publish fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every batch published so far.
    pub fn published(&self) -> Vec<Vec<CanonicalEvent>> {
        self.published.read().unwrap().clone()
    }
}

#[async_trait]
impl CalendarSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, events: &[CanonicalEvent]) -> Result<()> {
        if self.fail {
            return Err(SyncError::Publish("Mock sink failure".into()));
        }
        self.published.write().unwrap().push(events.to_vec());
        Ok(())
    }
}
