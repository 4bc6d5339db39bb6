//! Team Schedule Extraction Library
//!
//! Pulls a team's competition schedule off a session-bound sports website
//! and turns it into a clean, ordered list of calendar events.
//!
//! # Flow
//!
//! 1. Visit the entry page so the site hands out its session cookies
//! 2. Find and parse the competitions listing into row stubs
//! 3. Resolve each row's detail page (plain link or form replay)
//! 4. Normalize dates, times, locations and event types
//! 5. Hand the ordered events to the configured sinks (unless dry-run)
//!
//! # Usage
//!
//! ```rust,ignore
//! use schedule_sync::{HttpSession, Pipeline, SyncConfig};
//!
//! let config = SyncConfig::default().with_home_venue("Evanston HS");
//! let session = HttpSession::new(&config.http)?;
//! let report = Pipeline::new(config).run(&session, true).await?;
//!
//! for event in &report.events {
//!     println!("{} {}", event.start_local, event.title);
//! }
//! ```
//!
//! # Modules
//!
//! - [`session`] - Cookie-bearing HTTP session and the `Fetcher` seam
//! - [`form`] - HTML form extraction and replay
//! - [`listing`] - Listing discovery and row parsing
//! - [`detail`] - Detail page resolution
//! - [`normalize`] - Dates, times, venues and event types
//! - [`pipeline`] - Run orchestration and sinks
//! - [`testing`] - Mock implementations for testing

pub mod detail;
pub mod error;
pub mod form;
pub mod html;
pub mod listing;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use error::{DetailFetchFailed, FailureKind, FetchError, SkipReason, SyncError};
pub use types::{
    config::{HttpConfig, SeasonConfig, SiteConfig, SyncConfig},
    event::{event_id, CanonicalEvent, EventType, HomeStatus},
    raw::{DateText, DetailRef, RawDetailRecord, RawEventStub},
};

pub use detail::{parse_detail, resolve, DetailStatus, ResolvedDetail};
pub use form::{describe_form, extract_form, replay, FieldExtractable, FormDescriptor};
pub use listing::{find_listing_link, ListingPage};
pub use normalize::{KeywordRule, KeywordTable, Normalizer};
pub use pipeline::{
    CalendarSink, Diagnostics, Pipeline, PipelineState, SkipEntry, SkipStage, SyncReport,
};
pub use session::{Document, FetchRequest, Fetcher, FormEncoding, HttpSession, Method};

// Re-export testing utilities
pub use testing::{MockFailure, MockFetcher, RecordingSink};
