//! Tolerant date and time parsing for listing and detail text.
//!
//! Supported date shapes:
//! - `2026-01-05`
//! - `1/5/2026`, `1/5/26`
//! - `Friday, January 5, 2026`, `Jan 5, 2026`, `Jan. 5th 2026`
//! - `Mon, Jan 5`, `Jan 5` (year from the season)
//! - `1/5` (year from the season)
//!
//! Supported times: `4:00 PM`, `4 PM`, `4:00pm`, `4 p.m.`, `16:00`, `noon`,
//! and ranges such as `4:00 - 6:30 PM`.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

use crate::html::regex;
use crate::types::config::SeasonConfig;

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const WEEKDAY: &str = r"(?:(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+)?";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"));

static NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b"));

static NAMED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"(?i)\b{WEEKDAY}{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s*(\d{{4}})\b)?"
    ))
});

static BARE_NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\b(\d{1,2})/(\d{1,2})\b"));

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*(?:([ap])\.?\s?m\.?)?\s*(?:-|–|—|to)\s*(\d{1,2})(?::([0-5]\d))?\s*(?:([ap])\.?\s?m\.?)?",
    )
});

static MERIDIEM_TIME: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?\s?m\b\.?"));

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| regex(r"\b(\d{1,2}):([0-5]\d)\b"));

static NOON: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)\bnoon\b"));

/// A start time with an optional end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
}

fn month_number(name: &str) -> Option<u32> {
    let key: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday_of(name: &str) -> Option<Weekday> {
    name.get(..3)?.to_ascii_lowercase().parse::<Weekday>().ok()
}

fn num<T: std::str::FromStr>(caps: &Captures, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

/// Locate the first date-looking substring in `text`.
///
/// Fully specified dates are preferred over bare month/day forms.
pub fn find_date_text(text: &str) -> Option<&str> {
    [&*ISO_DATE, &*NUMERIC_DATE, &*NAMED_DATE, &*BARE_NUMERIC_DATE]
        .into_iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim())
}

/// Parse the first recognizable date in `text`.
///
/// Dates without a year get one from `season`.
pub fn parse_date(text: &str, season: &SeasonConfig) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?);
        if date.is_some() {
            return date;
        }
    }

    if let Some(caps) = NUMERIC_DATE.captures(text) {
        let year = full_year(caps.get(3)?.as_str())?;
        let date = NaiveDate::from_ymd_opt(year, num(&caps, 1)?, num(&caps, 2)?);
        if date.is_some() {
            return date;
        }
    }

    if let Some(caps) = NAMED_DATE.captures(text) {
        let month = month_number(caps.get(2)?.as_str())?;
        let day: u32 = num(&caps, 3)?;
        let year = match caps.get(4) {
            Some(y) => y.as_str().parse().ok()?,
            None => season.year_for_month(month),
        };
        let date = NaiveDate::from_ymd_opt(year, month, day);
        if let (Some(date), Some(named)) = (date, caps.get(1).and_then(|w| weekday_of(w.as_str())))
        {
            if date.weekday() != named {
                debug!(text = %text, %date, stated = ?named, "Weekday does not match date");
            }
        }
        if date.is_some() {
            return date;
        }
    }

    let caps = BARE_NUMERIC_DATE.captures(text)?;
    let month: u32 = num(&caps, 1)?;
    NaiveDate::from_ymd_opt(season.year_for_month(month), month, num(&caps, 2)?)
}

/// 12-hour clock to 24-hour. Without a meridiem, 1-6 o'clock is taken as
/// afternoon since nothing on this schedule starts before dawn.
fn to_time(hour: u32, minute: u32, meridiem: Option<char>) -> Option<NaiveTime> {
    let hour = match meridiem {
        Some('p') if hour < 12 => hour + 12,
        Some('a') if hour == 12 => 0,
        Some(_) => hour,
        None if (1..=6).contains(&hour) => hour + 12,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn meridiem(caps: &Captures, index: usize) -> Option<char> {
    caps.get(index)
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_lowercase())
}

fn parse_range(caps: &Captures) -> Option<TimeRange> {
    let start_minute = caps.get(2);
    let end_minute = caps.get(5);
    let start_mer = meridiem(caps, 3);
    let end_mer = meridiem(caps, 6);

    // "9-10" is a day span or a score, not a time range.
    if start_minute.is_none() && end_minute.is_none() && start_mer.is_none() && end_mer.is_none()
    {
        return None;
    }

    let start_hour: u32 = num(caps, 1)?;
    let end_hour: u32 = num(caps, 4)?;
    let start_minute = start_minute.map_or(Some(0), |m| m.as_str().parse().ok())?;
    let end_minute = end_minute.map_or(Some(0), |m| m.as_str().parse().ok())?;

    let end = to_time(end_hour, end_minute, end_mer.or(start_mer))?;
    let mut start = to_time(start_hour, start_minute, start_mer.or(end_mer))?;
    if start > end && start_mer.is_none() {
        // "11 - 1 PM": the start is in the morning.
        start = to_time(start_hour, start_minute, Some('a'))?;
    }
    Some(TimeRange {
        start,
        end: Some(end),
    })
}

/// Blank out every date so its day number can't be read as an hour.
fn without_dates(text: &str) -> String {
    let mut masked = text.to_string();
    for re in [&*ISO_DATE, &*NUMERIC_DATE, &*NAMED_DATE, &*BARE_NUMERIC_DATE] {
        masked = re
            .replace_all(&masked, |caps: &Captures| " ".repeat(caps[0].len()))
            .into_owned();
    }
    masked
}

/// Parse the first time (or time range) in `text`.
pub fn parse_time_range(text: &str) -> Option<TimeRange> {
    let text = without_dates(text);
    let text = text.as_str();
    if let Some(range) = TIME_RANGE.captures_iter(text).find_map(|c| parse_range(&c)) {
        return Some(range);
    }

    let meridiem_match = MERIDIEM_TIME.captures(text).and_then(|caps| {
        let at = caps.get(0)?.start();
        let minute = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        Some((at, to_time(num(&caps, 1)?, minute, meridiem(&caps, 3))?))
    });
    let clock_match = CLOCK_TIME.captures(text).and_then(|caps| {
        let at = caps.get(0)?.start();
        Some((at, to_time(num(&caps, 1)?, num(&caps, 2)?, None)?))
    });
    let noon_match = NOON
        .find(text)
        .and_then(|m| Some((m.start(), NaiveTime::from_hms_opt(12, 0, 0)?)));

    [meridiem_match, clock_match, noon_match]
        .into_iter()
        .flatten()
        .min_by_key(|(at, _)| *at)
        .map(|(_, start)| TimeRange { start, end: None })
}
