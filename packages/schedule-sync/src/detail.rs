//! Detail page resolution and parsing.

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::DetailFetchFailed;
use crate::form::{extract_form, replay};
use crate::html::{collapse_ws, css, element_text, regex, text_segments};
use crate::normalize::dates::{find_date_text, parse_time_range};
use crate::session::{Document, Fetcher};
use crate::types::raw::{DetailRef, RawDetailRecord, RawEventStub};

static DT: LazyLock<Selector> = LazyLock::new(|| css("dl dt"));
static TABLE_ROW: LazyLock<Selector> = LazyLock::new(|| css("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| css("th, td"));
static BODY: LazyLock<Selector> = LazyLock::new(|| css("body"));
static TITLE_EL: LazyLock<Selector> = LazyLock::new(|| css(".title"));
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| css("h1, h2"));
static DESCRIPTION_EL: LazyLock<Selector> = LazyLock::new(|| css(".description"));

static LABEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"^([A-Za-z][A-Za-z /&'-]{0,30}?)\s*:\s*(\S.*)$"));
static AT_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)(?:^|\s)(?:at|@)\s+([a-z][^,\n]*)"));

const TITLE_LABELS: &[&str] = &["event", "meet", "name"];
const WHEN_LABELS: &[&str] = &["date", "time", "when", "start"];
const LOCATION_LABELS: &[&str] = &["location", "venue", "site", "facility", "where"];
const DESCRIPTION_LABELS: &[&str] = &["description", "notes", "details"];

/// How the detail of one stub was obtained.
#[derive(Debug)]
pub enum DetailStatus {
    Fetched,
    /// The row had no detail link or form
    Absent,
    /// Fetching failed; the record holds listing fields only
    Failed(DetailFetchFailed),
}

/// A detail record together with how it was obtained.
#[derive(Debug)]
pub struct ResolvedDetail {
    pub record: RawDetailRecord,
    pub status: DetailStatus,
}

/// Follow a stub's detail reference and parse what comes back.
///
/// Never fails: any error degrades to a record built from the stub.
pub async fn resolve<F: Fetcher + ?Sized>(fetcher: &F, stub: &RawEventStub) -> ResolvedDetail {
    let fetched = match &stub.detail {
        DetailRef::None => {
            return ResolvedDetail {
                record: RawDetailRecord::from_stub(stub),
                status: DetailStatus::Absent,
            }
        }
        DetailRef::Link(url) => fetcher.get(url).await.map_err(DetailFetchFailed::from),
        DetailRef::FormTrigger { fragment, base } => match extract_form(fragment, base) {
            Ok(form) => replay(fetcher, &form).await.map_err(DetailFetchFailed::from),
            Err(e) => Err(DetailFetchFailed::Form(e.to_string())),
        },
    };

    match fetched {
        Ok(doc) => {
            debug!(title = %stub.title, url = %doc.url, "Fetched detail page");
            ResolvedDetail {
                record: parse_detail(&doc, stub),
                status: DetailStatus::Fetched,
            }
        }
        Err(error) => {
            warn!(
                title = %stub.title,
                order = stub.source_order,
                error = %error,
                "Detail fetch failed, using listing fields"
            );
            ResolvedDetail {
                record: RawDetailRecord::degraded(stub),
                status: DetailStatus::Failed(error),
            }
        }
    }
}

/// Pull labelled fields out of a detail document.
///
/// Fields the page does not carry fall back to the stub's values.
pub fn parse_detail(doc: &Document, stub: &RawEventStub) -> RawDetailRecord {
    let html = doc.html();
    let fields = labelled_fields(&html);
    let lines = body_lines(&html);

    let raw_title = first_labelled(&fields, TITLE_LABELS)
        .or_else(|| first_text(&html, &TITLE_EL))
        .or_else(|| first_text(&html, &HEADLINE))
        .or_else(|| Some(stub.title.clone()));

    let raw_date_time = all_labelled(&fields, WHEN_LABELS).or_else(|| {
        lines
            .iter()
            .find(|line| parse_time_range(line).is_some() || find_date_text(line).is_some())
            .cloned()
    });

    // Free text is a last resort: "at ..." shows up in nav and footers too.
    let raw_location = first_labelled(&fields, LOCATION_LABELS)
        .or_else(|| stub.location.clone())
        .or_else(|| {
            lines.iter().find_map(|line| {
                AT_LOCATION
                    .captures(line)
                    .map(|caps| caps[1].trim().to_string())
            })
        });

    let raw_description = first_labelled(&fields, DESCRIPTION_LABELS)
        .or_else(|| first_text(&html, &DESCRIPTION_EL));

    RawDetailRecord {
        raw_title,
        raw_date_time,
        raw_location,
        raw_description,
        misc_fields: fields,
        degraded: false,
    }
}

fn label_key(label: &str) -> String {
    collapse_ws(label.trim_end_matches(':')).to_lowercase()
}

fn insert_field(fields: &mut IndexMap<String, String>, label: &str, value: String) {
    let key = label_key(label);
    if key.is_empty() || value.is_empty() {
        return;
    }
    fields.entry(key).or_insert(value);
}

/// Every `label -> value` pair in the document; the first occurrence of a
/// label wins.
fn labelled_fields(html: &Html) -> IndexMap<String, String> {
    let mut fields = IndexMap::new();

    for dt in html.select(&DT) {
        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "dd" | "dt"))
            .filter(|el| el.value().name() == "dd");
        if let Some(dd) = dd {
            insert_field(&mut fields, &element_text(dt), element_text(dd));
        }
    }

    for tr in html.select(&TABLE_ROW) {
        let cells: Vec<ElementRef> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| CELL.matches(c))
            .collect();
        if let [label, value] = cells.as_slice() {
            insert_field(&mut fields, &element_text(*label), element_text(*value));
        }
    }

    for line in body_lines(html) {
        if let Some(caps) = LABEL_LINE.captures(&line) {
            if caps[2].starts_with("//") {
                continue;
            }
            insert_field(&mut fields, &caps[1], caps[2].trim().to_string());
        }
    }

    fields
}

/// Text lines of the body. A segment ending in `:` is joined with the
/// next one, so `<b>Location:</b> Pool` reads as one line.
fn body_lines(html: &Html) -> Vec<String> {
    let segments = match html.select(&BODY).next() {
        Some(body) => text_segments(body),
        None => text_segments(html.root_element()),
    };

    let mut lines = Vec::with_capacity(segments.len());
    let mut pending: Option<String> = None;
    for segment in segments {
        match pending.take() {
            Some(label) if !segment.ends_with(':') => lines.push(format!("{label} {segment}")),
            Some(label) => {
                lines.push(label);
                pending = Some(segment);
            }
            None if segment.ends_with(':') => pending = Some(segment),
            None => lines.push(segment),
        }
    }
    lines.extend(pending);
    lines
}

fn key_matches(key: &str, labels: &[&str]) -> bool {
    key.split(|c: char| !c.is_alphanumeric())
        .any(|word| labels.contains(&word))
}

fn first_labelled(fields: &IndexMap<String, String>, labels: &[&str]) -> Option<String> {
    fields
        .iter()
        .find(|(key, _)| key_matches(key, labels))
        .map(|(_, value)| value.clone())
}

/// Values of every matching label joined, so separate date and time fields
/// read as one string.
fn all_labelled(fields: &IndexMap<String, String>, labels: &[&str]) -> Option<String> {
    let mut values: Vec<&str> = Vec::new();
    for (_, value) in fields.iter().filter(|(key, _)| key_matches(key, labels)) {
        if !values.contains(&value.as_str()) {
            values.push(value);
        }
    }
    (!values.is_empty()).then(|| values.join(" "))
}

fn first_text(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::session::Method;
    use crate::testing::MockFetcher;
    use crate::types::raw::DateText;
    use url::Url;

    fn stub(detail: DetailRef) -> RawEventStub {
        RawEventStub {
            title: "vs New Trier".into(),
            date_text: DateText::Found("Fri, Jan 9".into()),
            location: Some("Evanston HS Pool".into()),
            detail,
            source_order: 3,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_definition_list() {
        let doc = Document::new(
            url("https://example.org/d/1"),
            r#"<html><body><h1>Wildkit Aquatics</h1>
               <dl><dt>Meet</dt><dd>New Trier Dual</dd>
                   <dt>Date</dt><dd>Friday, January 9, 2026</dd>
                   <dt>Time</dt><dd>4:30 PM - 6:30 PM</dd>
                   <dt>Location</dt><dd>New Trier HS (NT-1)</dd>
                   <dt>Notes</dt><dd>Wear team suits</dd></dl>
               </body></html>"#,
        );
        let record = parse_detail(&doc, &stub(DetailRef::None));
        assert_eq!(record.raw_title.as_deref(), Some("New Trier Dual"));
        assert_eq!(
            record.raw_date_time.as_deref(),
            Some("Friday, January 9, 2026 4:30 PM - 6:30 PM")
        );
        assert_eq!(record.raw_location.as_deref(), Some("New Trier HS (NT-1)"));
        assert_eq!(record.raw_description.as_deref(), Some("Wear team suits"));
        assert_eq!(record.misc_fields.get("notes").map(String::as_str), Some("Wear team suits"));
        assert!(!record.degraded);
    }

    #[test]
    fn test_parse_table_and_label_lines() {
        let doc = Document::new(
            url("https://example.org/d/2"),
            r#"<body><h2>Conference Relays</h2>
               <table><tr><th>When:</th><td>1/16/2026 5:00 PM</td></tr></table>
               <p><b>Venue:</b> Niles West Natatorium</p>
               <p>Facility Code: NW-3</p></body>"#,
        );
        let record = parse_detail(&doc, &stub(DetailRef::None));
        assert_eq!(record.raw_title.as_deref(), Some("Conference Relays"));
        assert_eq!(record.raw_date_time.as_deref(), Some("1/16/2026 5:00 PM"));
        assert_eq!(record.raw_location.as_deref(), Some("Niles West Natatorium"));
        assert_eq!(
            record.misc_fields.keys().collect::<Vec<_>>(),
            vec!["when", "venue", "facility code"]
        );
    }

    #[test]
    fn test_parse_free_text_fallbacks() {
        let doc = Document::new(
            url("https://example.org/d/3"),
            r#"<body><p>Warmups start 3:45 PM</p>
               <p>Meet held at Loyola Academy, Wilmette</p></body>"#,
        );
        let mut stub = stub(DetailRef::None);
        stub.location = None;
        let record = parse_detail(&doc, &stub);
        assert_eq!(record.raw_date_time.as_deref(), Some("Warmups start 3:45 PM"));
        assert_eq!(record.raw_location.as_deref(), Some("Loyola Academy"));
        assert_eq!(record.raw_title.as_deref(), Some("vs New Trier"));
    }

    #[test]
    fn test_listing_location_beats_free_text() {
        let doc = Document::new(
            url("https://example.org/d/4"),
            r#"<body><nav>Take a look at our photo gallery</nav>
               <p>Warmups start 3:45 PM</p></body>"#,
        );
        let record = parse_detail(&doc, &stub(DetailRef::None));
        assert_eq!(record.raw_location.as_deref(), Some("Evanston HS Pool"));

        let labelled = Document::new(
            url("https://example.org/d/5"),
            "<body><p>Location: New Trier HS</p></body>",
        );
        let record = parse_detail(&labelled, &stub(DetailRef::None));
        assert_eq!(record.raw_location.as_deref(), Some("New Trier HS"));
    }

    #[tokio::test]
    async fn test_resolve_link() {
        let detail = url("https://example.org/d/1");
        let fetcher = MockFetcher::new().with_page(
            detail.as_str(),
            "<body><dl><dt>Time</dt><dd>4:00 PM</dd></dl></body>",
        );
        let resolved = resolve(&fetcher, &stub(DetailRef::Link(detail))).await;
        assert!(matches!(resolved.status, DetailStatus::Fetched));
        assert_eq!(resolved.record.raw_date_time.as_deref(), Some("4:00 PM"));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_form_trigger_posts_fields() {
        let fetcher = MockFetcher::new().with_page(
            "https://example.org/main/Detail.aspx",
            "<body><p>Location: Evanston HS Pool</p></body>",
        );
        let stub = stub(DetailRef::FormTrigger {
            fragment: r#"<form method="post" action="Detail.aspx">
                           <input type="hidden" name="id" value="7"></form>"#
                .into(),
            base: url("https://example.org/main/Competitions"),
        });
        let resolved = resolve(&fetcher, &stub).await;
        assert!(matches!(resolved.status, DetailStatus::Fetched));

        let calls = fetcher.calls();
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[0].fields, vec![("id".to_string(), "7".to_string())]);
    }

    #[tokio::test]
    async fn test_resolve_failure_degrades() {
        let detail = url("https://example.org/d/404");
        let fetcher = MockFetcher::new().with_error(
            detail.as_str(),
            FetchError::HttpStatus {
                url: detail.to_string(),
                status: 404,
            },
        );
        let resolved = resolve(&fetcher, &stub(DetailRef::Link(detail))).await;
        assert!(matches!(resolved.status, DetailStatus::Failed(DetailFetchFailed::Fetch(_))));
        assert!(resolved.record.degraded);
        assert_eq!(resolved.record.raw_location.as_deref(), Some("Evanston HS Pool"));
    }

    #[tokio::test]
    async fn test_resolve_formless_fragment_degrades() {
        let fetcher = MockFetcher::new();
        let stub = stub(DetailRef::FormTrigger {
            fragment: "<div>no form</div>".into(),
            base: url("https://example.org/"),
        });
        let resolved = resolve(&fetcher, &stub).await;
        assert!(matches!(resolved.status, DetailStatus::Failed(DetailFetchFailed::Form(_))));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_absent() {
        let fetcher = MockFetcher::new();
        let resolved = resolve(&fetcher, &stub(DetailRef::None)).await;
        assert!(matches!(resolved.status, DetailStatus::Absent));
        assert!(!resolved.record.degraded);
    }
}
