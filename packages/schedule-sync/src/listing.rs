//! Listing discovery and row extraction.
//!
//! The listing page is parsed once into owned row fragments so the result
//! can cross await points; [`ListingPage::stubs`] re-parses each fragment
//! lazily and can be run any number of times.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SkipReason;
use crate::html::{collapse_ws, css, element_text, regex, text_segments};
use crate::normalize::dates::{find_date_text, parse_time_range};
use crate::session::Document;
use crate::types::raw::{DateText, DetailRef, RawEventStub};

static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static CANDIDATE: LazyLock<Selector> = LazyLock::new(|| css("tr, div, li, article, section"));
static TABLE_ROW: LazyLock<Selector> = LazyLock::new(|| css("tr"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| css("th"));
static DATA_CELL: LazyLock<Selector> = LazyLock::new(|| css("td"));
static FORM: LazyLock<Selector> = LazyLock::new(|| css("form"));
static DATETIME: LazyLock<Selector> = LazyLock::new(|| css("time[datetime]"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| css("h3, h4, strong"));

static COMPETITIONS_TEXT: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)\bcompetitions?\b"));

/// A class token naming a single event: `event`, `event-row`, `swim-meet`,
/// `game_item`. Plural containers (`events`) and field classes
/// (`event-date`) do not count.
static ROW_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)^(?:[a-z0-9]+[-_])*(?:event|competition|game|match|meet)(?:[-_](?:row|item|card|entry|listing))?$")
});

static TITLE_CLASS: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)name|title|opponent"));
static DATE_CLASS: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)date"));
static LOCATION_CLASS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)location|venue|site|facility"));
static DETAIL_LINK_TEXT: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\b(?:info|details?|more)\b"));
static WEEKDAY_WORD: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\b(?:mon|tues|wednes|thurs|fri|satur|sun)day\b"));

/// Find the link from the entry page to the competitions listing.
///
/// Link text naming competitions wins over an href that merely contains
/// `compet`.
pub fn find_listing_link(doc: &Document) -> Option<Url> {
    let html = doc.html();
    let links: Vec<ElementRef> = html.select(&LINK).collect();

    let by_text = links
        .iter()
        .find(|a| COMPETITIONS_TEXT.is_match(&element_text(**a)));
    let by_href = || {
        links.iter().find(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.to_lowercase().contains("compet"))
        })
    };

    let href = by_text.or_else(by_href)?.value().attr("href")?;
    let url = doc.url.join(href.trim()).ok()?;
    debug!(listing_url = %url, "Found competitions link");
    Some(url)
}

/// Row fragments of a parsed listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    url: Url,
    rows: Vec<RowFragment>,
}

#[derive(Debug, Clone)]
struct RowFragment {
    tag: String,
    html: String,
}

impl RowFragment {
    fn of(el: ElementRef) -> Self {
        Self {
            tag: el.value().name().to_string(),
            html: el.html(),
        }
    }

    /// Re-parse the fragment. Table rows need a table around them to
    /// survive fragment parsing.
    fn parse(&self) -> Html {
        match self.tag.as_str() {
            "tr" => Html::parse_fragment(&format!("<table><tbody>{}</tbody></table>", self.html)),
            _ => Html::parse_fragment(&self.html),
        }
    }
}

impl ListingPage {
    /// Locate the event rows of a listing document.
    ///
    /// A page with no recognizable rows parses to an empty listing; the
    /// caller decides whether that is fatal.
    pub fn parse(doc: &Document) -> Self {
        let html = doc.html();

        let mut rows: Vec<RowFragment> = html
            .select(&CANDIDATE)
            .filter(|el| is_event_row(*el) && !has_row_ancestor(*el))
            .map(RowFragment::of)
            .collect();

        if rows.is_empty() {
            debug!(url = %doc.url, "No event-classed rows, falling back to table rows");
            rows = html
                .select(&TABLE_ROW)
                .filter(|tr| is_data_row(*tr))
                .map(RowFragment::of)
                .collect();
        }

        if rows.is_empty() {
            warn!(url = %doc.url, "No event rows on listing page");
        } else {
            info!(url = %doc.url, rows = rows.len(), "Parsed listing page");
        }
        Self {
            url: doc.url.clone(),
            rows,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One stub (or skip reason) per row, in document order.
    pub fn stubs(&self) -> impl Iterator<Item = Result<RawEventStub, SkipReason>> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(order, row)| extract_stub(row, order, &self.url))
    }
}

fn is_event_row(el: ElementRef) -> bool {
    el.value().classes().any(|c| ROW_CLASS.is_match(c))
}

fn has_row_ancestor(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CANDIDATE.matches(&a) && is_event_row(a))
}

/// Table rows with at least one data cell and some text.
fn is_data_row(tr: ElementRef) -> bool {
    let header_only =
        tr.select(&HEADER_CELL).next().is_some() && tr.select(&DATA_CELL).next().is_none();
    !header_only && !element_text(tr).is_empty()
}

/// First descendant (not `root` itself) with a class matching `pattern`.
fn find_by_class<'a>(root: ElementRef<'a>, pattern: &Regex) -> Option<ElementRef<'a>> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().classes().any(|c| pattern.is_match(c)) && !element_text(*el).is_empty()
        })
}

fn extract_stub(
    fragment: &RowFragment,
    order: usize,
    page_url: &Url,
) -> Result<RawEventStub, SkipReason> {
    let html = fragment.parse();
    let selector = Selector::parse(&fragment.tag)
        .map_err(|_| SkipReason::MalformedRow(format!("unexpected row tag <{}>", fragment.tag)))?;
    let row = html
        .select(&selector)
        .next()
        .ok_or_else(|| SkipReason::MalformedRow("row did not survive re-parsing".to_string()))?;

    let row_text = element_text(row);
    let date_text = row_date(row, &row_text);
    let location = find_by_class(row, &LOCATION_CLASS).map(element_text);
    let detail = detail_ref(row, page_url);

    let title = row_title(row, location.as_deref()).ok_or_else(|| {
        debug!(order, row = %row_text, "Row has no title");
        SkipReason::MalformedRow(format!("no title in row {order}: {row_text:?}"))
    })?;

    Ok(RawEventStub {
        title,
        date_text,
        location,
        detail,
        source_order: order,
    })
}

fn row_date(row: ElementRef, row_text: &str) -> DateText {
    if let Some(el) = find_by_class(row, &DATE_CLASS) {
        return DateText::Found(element_text(el));
    }

    if let Some(time) = row.select(&DATETIME).next() {
        let text = element_text(time);
        if find_date_text(&text).is_some() {
            return DateText::Found(text);
        }
        if let Some(attr) = time.value().attr("datetime") {
            return DateText::Found(collapse_ws(attr));
        }
    }

    // The whole segment keeps any time printed next to the date.
    text_segments(row)
        .into_iter()
        .find(|segment| find_date_text(segment).is_some())
        .map(DateText::Found)
        .unwrap_or_else(|| DateText::BestEffort(row_text.to_string()))
}

fn row_title(row: ElementRef, location: Option<&str>) -> Option<String> {
    let named = find_by_class(row, &TITLE_CLASS)
        .into_iter()
        .chain(row.select(&HEADING))
        .map(element_text)
        .find(|text| !text.is_empty() && !looks_like_when(text));
    if named.is_some() {
        return named;
    }

    text_segments(row).into_iter().find(|line| {
        let len = line.chars().count();
        (3..=80).contains(&len)
            && !looks_like_when(line)
            && Some(line.as_str()) != location
            && !DETAIL_LINK_TEXT.is_match(line)
    })
}

fn looks_like_when(line: &str) -> bool {
    find_date_text(line).is_some()
        || parse_time_range(line).is_some()
        || WEEKDAY_WORD.is_match(line)
}

fn detail_ref(row: ElementRef, page_url: &Url) -> DetailRef {
    let link = row
        .select(&LINK)
        .filter(|a| DETAIL_LINK_TEXT.is_match(&element_text(*a)))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            !href.is_empty()
                && !href.starts_with('#')
                && !href.to_lowercase().starts_with("javascript:")
        })
        .find_map(|href| page_url.join(href).ok());

    if let Some(url) = link {
        return DetailRef::Link(url);
    }

    match row.select(&FORM).next() {
        Some(form) => DetailRef::FormTrigger {
            fragment: form.html(),
            base: page_url.clone(),
        },
        None => DetailRef::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, body: &str) -> Document {
        Document::new(Url::parse(url).unwrap(), body)
    }

    fn page(body: &str) -> ListingPage {
        ListingPage::parse(&doc("https://example.org/main/Competitions", body))
    }

    #[test]
    fn test_find_listing_link_prefers_text() {
        let entry = doc(
            "https://example.org/main/Team",
            r#"<a href="/compete/archive">Archive</a>
               <a href="/main/Competitions/123">Competitions</a>"#,
        );
        assert_eq!(
            find_listing_link(&entry).unwrap().as_str(),
            "https://example.org/main/Competitions/123"
        );
    }

    #[test]
    fn test_find_listing_link_falls_back_to_href() {
        let entry = doc(
            "https://example.org/main/Team",
            r#"<a href="news">News</a><a href="CompetitionList.aspx">Schedule</a>"#,
        );
        assert_eq!(
            find_listing_link(&entry).unwrap().as_str(),
            "https://example.org/main/CompetitionList.aspx"
        );
        assert!(find_listing_link(&doc("https://example.org/", "<a href='/x'>x</a>")).is_none());
    }

    #[test]
    fn test_classed_rows() {
        let listing = page(
            r#"<div class="events">
                 <div class="event">
                   <span class="event-date">Fri, Jan 9</span>
                   <span class="event-name">vs New Trier</span>
                   <span class="event-location">Evanston HS Pool</span>
                   <a href="/main/Competition/42">Info</a>
                 </div>
                 <div class="event">
                   <span class="event-date">Sat, Jan 17</span>
                   <span class="event-name">Wildkit Invitational</span>
                 </div>
               </div>"#,
        );
        assert_eq!(listing.len(), 2);

        let stubs: Vec<_> = listing.stubs().map(|s| s.unwrap()).collect();
        assert_eq!(stubs[0].title, "vs New Trier");
        assert_eq!(stubs[0].date_text, DateText::Found("Fri, Jan 9".into()));
        assert_eq!(stubs[0].location.as_deref(), Some("Evanston HS Pool"));
        assert_eq!(
            stubs[0].detail,
            DetailRef::Link(Url::parse("https://example.org/main/Competition/42").unwrap())
        );
        assert_eq!(stubs[1].detail, DetailRef::None);
        assert_eq!(stubs[1].source_order, 1);
    }

    #[test]
    fn test_table_fallback_skips_headers_and_blank_rows() {
        let listing = page(
            r#"<table>
                 <tr><th>Date</th><th>Opponent</th></tr>
                 <tr><td>12/6/2025</td><td>@ Loyola Academy</td></tr>
                 <tr><td> </td><td></td></tr>
                 <tr><td>1/13/2026 4:30 PM</td><td>vs Niles North</td>
                     <td><form method="post" action="Detail.aspx"><input type="hidden" name="id" value="7"></form></td></tr>
               </table>"#,
        );
        assert_eq!(listing.len(), 2);

        let stubs: Vec<_> = listing.stubs().map(|s| s.unwrap()).collect();
        assert_eq!(stubs[0].title, "@ Loyola Academy");
        assert_eq!(stubs[0].date_text, DateText::Found("12/6/2025".into()));
        assert_eq!(stubs[1].date_text, DateText::Found("1/13/2026 4:30 PM".into()));
        match &stubs[1].detail {
            DetailRef::FormTrigger { fragment, base } => {
                assert!(fragment.contains("Detail.aspx"));
                assert_eq!(base, listing.url());
            }
            other => panic!("expected form trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_row_without_title_is_skipped() {
        let listing = page(
            r#"<ul>
                 <li class="meet">Jan 9 <a href="/d/1">Info</a></li>
                 <li class="meet"><span>Jan 16</span> Conference Relays</li>
               </ul>"#,
        );
        let results: Vec<_> = listing.stubs().collect();
        assert!(matches!(results[0], Err(SkipReason::MalformedRow(_))));
        assert_eq!(results[1].as_ref().unwrap().title, "Conference Relays");
    }

    #[test]
    fn test_missing_date_keeps_row_text() {
        let listing = page(r#"<div class="event"><h3>Senior Night</h3><p>Home</p></div>"#);
        let stub = listing.stubs().next().unwrap().unwrap();
        assert_eq!(stub.title, "Senior Night");
        assert_eq!(stub.date_text, DateText::BestEffort("Senior Night Home".into()));
    }

    #[test]
    fn test_stubs_are_restartable() {
        let listing = page(r#"<div class="event"><h4>vs Maine South</h4><time datetime="2026-01-23">Friday</time></div>"#);
        let first: Vec<_> = listing.stubs().collect();
        let second: Vec<_> = listing.stubs().collect();
        assert_eq!(first, second);
        assert_eq!(
            first[0].as_ref().unwrap().date_text,
            DateText::Found("2026-01-23".into())
        );
    }

    #[test]
    fn test_no_rows_is_empty_listing() {
        let listing = ListingPage::parse(&doc("https://example.org/", "<p>Nothing scheduled</p>"));
        assert!(listing.is_empty());
        assert_eq!(listing.stubs().count(), 0);
    }

    #[test]
    fn test_date_heading_is_not_the_title() {
        let listing = page(
            r#"<table>
                 <tr><td><strong>Fri, Jan 9</strong></td><td>vs New Trier</td></tr>
               </table>"#,
        );
        let stub = listing.stubs().next().unwrap().unwrap();
        assert_eq!(stub.title, "vs New Trier");
        assert_eq!(stub.date_text, DateText::Found("Fri, Jan 9".into()));
    }

    #[test]
    fn test_nested_rows_keep_outermost() {
        let listing = page(
            r#"<div class="meet-card"><div class="meet">inner</div><strong>vs Evanston</strong><span>Jan 30</span></div>"#,
        );
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.stubs().next().unwrap().unwrap().title, "vs Evanston");
    }
}
