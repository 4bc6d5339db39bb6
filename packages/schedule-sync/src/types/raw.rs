//! Transient records that live only inside one pipeline run.

use indexmap::IndexMap;
use url::Url;

/// How the detail for a listing row is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRef {
    /// Plain link, fetched with GET
    Link(Url),

    /// A form inside the row; replayed through the form extractor
    FormTrigger {
        /// Outer HTML of the form (or the row containing it)
        fragment: String,
        /// URL of the document the fragment came from
        base: Url,
    },

    /// Row has no way to reach a detail page
    None,
}

/// Date text as found on the listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateText {
    /// A recognizable date string
    Found(String),

    /// No date field; the whole row text is kept for best-effort parsing
    BestEffort(String),
}

impl DateText {
    pub fn as_str(&self) -> &str {
        match self {
            DateText::Found(s) | DateText::BestEffort(s) => s,
        }
    }
}

/// One row of the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventStub {
    pub title: String,
    pub date_text: DateText,
    pub location: Option<String>,
    pub detail: DetailRef,
    /// Zero-based position among the page's rows
    pub source_order: usize,
}

/// Semi-structured fields scraped from a detail document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDetailRecord {
    pub raw_title: Option<String>,
    pub raw_date_time: Option<String>,
    pub raw_location: Option<String>,
    pub raw_description: Option<String>,
    /// Every `label -> text` pair found, labels lowercased, document order
    pub misc_fields: IndexMap<String, String>,
    /// Built from listing fields only
    pub degraded: bool,
}

impl RawDetailRecord {
    /// Record carrying only what the listing row already knew.
    pub fn from_stub(stub: &RawEventStub) -> Self {
        Self {
            raw_title: Some(stub.title.clone()),
            raw_date_time: None,
            raw_location: stub.location.clone(),
            raw_description: None,
            misc_fields: IndexMap::new(),
            degraded: false,
        }
    }

    /// Listing-only record used when the detail fetch failed.
    pub fn degraded(stub: &RawEventStub) -> Self {
        Self {
            degraded: true,
            ..Self::from_stub(stub)
        }
    }
}
