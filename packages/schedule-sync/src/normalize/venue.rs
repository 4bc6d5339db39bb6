//! Location cleanup and home/away detection.

use regex::Regex;
use std::sync::LazyLock;

use crate::html::{collapse_ws, regex};
use crate::types::event::HomeStatus;

/// Placeholder for an unknown location.
pub const TBD: &str = "TBD";

static LEADING_LABEL: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)^(?:(?:location|venue|site|where|facility)\s*:\s*|(?:at|@)\s+)"));

static BRACKETED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)\s*[\(\[]\s*(?:fac(?:ility)?\.?\s*(?:code|#|no\.?)?\s*:?\s*)?[a-z0-9]{1,6}[-#]?\d{1,4}\s*[\)\]]$")
});

static DASHED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)\s*[-–|,]\s*fac(?:ility)?\.?\s*(?:code|#|no\.?)?\s*:?\s*#?\s*[a-z0-9-]+$")
});

static LABELLED_CODE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\s*facility\s+code\s*:?\s*\S+$"));

static TRAILING_PUNCT: LazyLock<Regex> = LazyLock::new(|| regex(r"[\s,;:\-–|]+$"));

/// Strip labels and facility codes, collapse whitespace, and map empty to
/// [`TBD`].
pub fn clean_location(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return TBD.to_string();
    };

    let mut location = collapse_ws(raw);
    location = LEADING_LABEL.replace(&location, "").into_owned();

    loop {
        let before = location.len();
        for pattern in [&*BRACKETED_CODE, &*DASHED_CODE, &*LABELLED_CODE, &*TRAILING_PUNCT] {
            location = pattern.replace(&location, "").into_owned();
        }
        if location.len() == before {
            break;
        }
    }

    let location = location.trim();
    if location.is_empty() || ["tbd", "tba", "n/a"].contains(&location.to_lowercase().as_str()) {
        TBD.to_string()
    } else {
        location.to_string()
    }
}

/// Home when the cleaned location mentions the home venue, away for any
/// other known location, unknown when there is nothing to go on.
pub fn home_status(location: &str, home_venue: &str) -> HomeStatus {
    let location = location.trim();
    if location.is_empty() || location.eq_ignore_ascii_case(TBD) {
        return HomeStatus::Unknown;
    }
    let venue = home_venue.trim().to_lowercase();
    if !venue.is_empty() && location.to_lowercase().contains(&venue) {
        HomeStatus::Home
    } else {
        HomeStatus::Away
    }
}
