//! Typed errors for the schedule extraction pipeline.
//!
//! Three tiers:
//! - [`FetchError`] for transport problems, retried inside the session
//! - [`SyncError`] for hard failures that abort a run
//! - [`SkipReason`] for per-item soft failures that only shrink the result set

use thiserror::Error;

/// Errors raised by a single network exchange.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, or body-read failure
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Request exceeded the configured timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// URL could not be parsed or joined
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether a retry has any chance of a different outcome.
    ///
    /// Transport failures and 5xx are retried. Every 4xx is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            FetchError::InvalidUrl { .. } => false,
        }
    }

    /// Build from a reqwest error, keeping timeouts distinct.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: Box::new(err),
            }
        }
    }
}

/// Hard failures. Any of these aborts the run and nothing is published.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure that outlived its retry budget
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The page does not look like anything we know how to read
    #[error("unrecognized page structure at {url}: {reason}")]
    PageStructure { url: String, reason: String },

    /// A form was required but the fragment had none
    #[error("no form found in fragment")]
    NoFormFound,

    /// Listing rows were found but every one of them was dropped
    #[error("no events survived extraction ({rows_seen} rows seen, {skipped} skipped)")]
    EmptyResult { rows_seen: usize, skipped: usize },

    /// URL could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Configuration is unusable
    #[error("config error: {0}")]
    Config(String),

    /// A calendar sink failed while publishing
    #[error("publish failed: {0}")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    /// Short label for the failure kind, used in the pipeline state.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Fetch(_) => FailureKind::Transport,
            SyncError::PageStructure { .. } | SyncError::NoFormFound => FailureKind::Structure,
            SyncError::EmptyResult { .. } => FailureKind::EmptyResult,
            SyncError::InvalidUrl { .. } | SyncError::Config(_) => FailureKind::Config,
            SyncError::Publish(_) => FailureKind::Publish,
        }
    }
}

/// Coarse classification of hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Structure,
    EmptyResult,
    Config,
    Publish,
}

/// Why a single row or event was left out of the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("could not parse date from {text:?}")]
    DateParse { text: String },

    #[error("duplicate event id {id}")]
    DuplicateId { id: String },
}

/// A detail page could not be reached. The event falls back to its listing
/// fields; the failure is counted but never aborts the run.
#[derive(Debug, Error)]
pub enum DetailFetchFailed {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("detail form unusable: {0}")]
    Form(String),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SyncError>;
