//! Property tests for date and time parsing.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use proptest::prelude::*;
use schedule_sync::normalize::{parse_date, parse_time_range};
use schedule_sync::SeasonConfig;

fn season() -> SeasonConfig {
    SeasonConfig::new(2025, 7)
}

/// Any day from July 2025 through June 2026.
fn season_date() -> impl Strategy<Value = NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
    (0i64..365).prop_map(move |offset| start + Duration::days(offset))
}

fn renderings(date: NaiveDate) -> Vec<String> {
    vec![
        date.format("%A, %B %-d, %Y").to_string(),
        date.format("%B %-d, %Y").to_string(),
        date.format("%b %-d, %Y").to_string(),
        date.format("%-m/%-d/%Y").to_string(),
        date.format("%-m/%-d/%y").to_string(),
        date.format("%Y-%m-%d").to_string(),
        date.format("%a, %b %-d").to_string(),
        date.format("%b %-d").to_string(),
        date.format("%-m/%-d").to_string(),
    ]
}

proptest! {
    #[test]
    fn every_pattern_parses_to_the_same_date(date in season_date()) {
        for text in renderings(date) {
            prop_assert_eq!(parse_date(&text, &season()), Some(date), "pattern {}", text);
        }
    }

    #[test]
    fn surrounding_text_does_not_matter(date in season_date(), title in "[A-Z][a-z]{2,10} [A-Z][a-z]{2,10}") {
        let text = format!("vs {title} - {}", date.format("%b %-d, %Y"));
        prop_assert_eq!(parse_date(&text, &season()), Some(date));
    }

    #[test]
    fn twelve_hour_times_round_trip(hour in 0u32..24, minute in 0u32..60) {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        let text = time.format("%-I:%M %p").to_string();
        let parsed = parse_time_range(&text).unwrap();
        prop_assert_eq!(parsed.start.hour(), hour);
        prop_assert_eq!(parsed.start.minute(), minute);
        prop_assert!(parsed.end.is_none());
    }
}

#[test]
fn bare_dates_follow_the_season() {
    let aug = parse_date("Aug 29", &season()).unwrap();
    assert_eq!(aug.year(), 2025);
    let feb = parse_date("Feb 14", &season()).unwrap();
    assert_eq!(feb.year(), 2026);
}
