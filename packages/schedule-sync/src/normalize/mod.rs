//! Raw text to canonical events.
//!
//! Everything here is pure: no network, no I/O, no clock.

pub mod classify;
pub mod dates;
pub mod venue;

use chrono::{Duration, NaiveTime};

use crate::error::SkipReason;
use crate::html::collapse_ws;
use crate::types::config::{SeasonConfig, SyncConfig};
use crate::types::event::{event_id, CanonicalEvent};
use crate::types::raw::{RawDetailRecord, RawEventStub};

pub use classify::{KeywordRule, KeywordTable};
pub use dates::{find_date_text, parse_date, parse_time_range, TimeRange};
pub use venue::{clean_location, home_status, TBD};

/// Turns raw listing and detail text into [`CanonicalEvent`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    season: SeasonConfig,
    default_duration: Duration,
    default_start: NaiveTime,
    home_venue: String,
    keywords: KeywordTable,
}

impl Normalizer {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            season: config.season,
            default_duration: Duration::minutes(config.default_duration_minutes),
            default_start: config.default_start_time,
            home_venue: config.home_venue.clone(),
            keywords: config.keywords.clone(),
        }
    }

    /// Build the canonical event for one listing row.
    ///
    /// The date comes from the listing row first so the id does not depend
    /// on whether the detail fetch worked; the time comes from the detail
    /// first because listings rarely carry one.
    pub fn normalize(
        &self,
        stub: &RawEventStub,
        detail: &RawDetailRecord,
    ) -> Result<CanonicalEvent, SkipReason> {
        let title = Some(collapse_ws(&stub.title))
            .filter(|t| !t.is_empty())
            .or_else(|| detail.raw_title.as_deref().map(collapse_ws))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SkipReason::MalformedRow("missing title".to_string()))?;

        let date = parse_date(stub.date_text.as_str(), &self.season)
            .or_else(|| {
                detail
                    .raw_date_time
                    .as_deref()
                    .and_then(|text| parse_date(text, &self.season))
            })
            .ok_or_else(|| SkipReason::DateParse {
                text: stub.date_text.as_str().to_string(),
            })?;

        let times = detail
            .raw_date_time
            .as_deref()
            .and_then(parse_time_range)
            .or_else(|| parse_time_range(stub.date_text.as_str()));

        let start_local = date.and_time(times.map_or(self.default_start, |t| t.start));
        let end_local = times
            .and_then(|t| t.end)
            .map(|end| date.and_time(end))
            .filter(|end| *end > start_local)
            .unwrap_or(start_local + self.default_duration);

        let location = clean_location(
            detail
                .raw_location
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .or(stub.location.as_deref()),
        );

        let description = detail
            .raw_description
            .as_deref()
            .map(collapse_ws)
            .filter(|d| !d.is_empty());

        Ok(CanonicalEvent {
            id: event_id(&title, date),
            home: home_status(&location, &self.home_venue),
            event_type: self.keywords.classify(&title),
            title,
            start_local,
            end_local,
            location,
            description,
            source_order: stub.source_order,
            degraded: detail.degraded,
        })
    }
}
