//! The canonical event record handed to calendar sinks.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of event, decided from title keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    DualMeet,
    Invitational,
    RelayMeet,
    Conference,
    Championship,
    Meeting,
    Special,
}

impl EventType {
    /// Human-readable label used on the calendar page and feed.
    pub fn label(&self) -> &'static str {
        match self {
            EventType::DualMeet => "Dual Meet",
            EventType::Invitational => "Invitational",
            EventType::RelayMeet => "Relay Meet",
            EventType::Conference => "Conference",
            EventType::Championship => "Championship",
            EventType::Meeting => "Meeting",
            EventType::Special => "Special Event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tri-state home/away flag. Location text often cannot settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeStatus {
    Home,
    Away,
    Unknown,
}

/// A normalized, typed schedule entry.
///
/// Times are naive civil times in the source's timezone. Use
/// [`CanonicalEvent::start_in`] to anchor them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Stable identifier derived from title and date
    pub id: String,

    pub title: String,

    pub start_local: NaiveDateTime,

    pub end_local: NaiveDateTime,

    /// Cleaned location, `"TBD"` when unknown
    pub location: String,

    pub home: HomeStatus,

    pub event_type: EventType,

    /// Free text from the detail page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Position in the listing page, tie-break for same-time events
    pub source_order: usize,

    /// Built from listing fields only because the detail fetch failed
    #[serde(default)]
    pub degraded: bool,
}

impl CanonicalEvent {
    /// Start anchored in `tz`.
    ///
    /// A time inside a spring-forward gap moves forward an hour.
    pub fn start_in(&self, tz: Tz) -> DateTime<Tz> {
        anchor(self.start_local, tz)
    }

    /// End anchored in `tz`.
    pub fn end_in(&self, tz: Tz) -> DateTime<Tz> {
        anchor(self.end_local, tz)
    }

    /// Chronological order, listing order as tie-break.
    pub fn sort_key(&self) -> (NaiveDateTime, usize) {
        (self.start_local, self.source_order)
    }
}

fn anchor(local: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&local))
}

/// Derive the stable id for an event.
///
/// Format: `YYYYMMDD-<first 12 hex chars of sha256(lowercased title | date)>`.
/// Whitespace and case in the title do not affect the result.
pub fn event_id(title: &str, date: NaiveDate) -> String {
    let normalized: String = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"|");
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", date.format("%Y%m%d"), &digest[..12])
}
