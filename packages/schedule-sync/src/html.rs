//! Small helpers shared by the HTML parsers.

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Parse a built-in CSS selector.
///
/// Only used for literals in this crate, so a failure is a programming error.
pub(crate) fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("built-in selector must parse")
}

/// Compile a built-in regex.
pub(crate) fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

/// Trim and collapse runs of whitespace (including `&nbsp;`) to one space.
pub fn collapse_ws(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty text nodes under `el`, whitespace collapsed, document order.
pub fn text_segments(el: ElementRef) -> Vec<String> {
    el.text()
        .map(collapse_ws)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// All text under `el` as one line.
pub fn element_text(el: ElementRef) -> String {
    text_segments(el).join(" ")
}
