//! Form discovery and replay outside a browser.
//!
//! Detail pages on the upstream site are reached by submitting small forms
//! embedded in the listing rows. [`extract_form`] turns such a fragment into a
//! [`FormDescriptor`] using the same serialization rules a browser applies,
//! and [`replay`] submits it through the run's session.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::error::{FetchResult, Result, SyncError};
use crate::html::{collapse_ws, css};
use crate::session::{Document, FetchRequest, Fetcher, FormEncoding, Method};

static FORM: LazyLock<Selector> = LazyLock::new(|| css("form"));
static CONTROLS: LazyLock<Selector> = LazyLock::new(|| css("input, select, textarea, button"));
static OPTION: LazyLock<Selector> = LazyLock::new(|| css("option"));

/// A submission derived from one `<form>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescriptor {
    pub action: Url,
    pub method: Method,
    /// Unique names in first-seen order, last-seen value
    pub fields: Vec<(String, String)>,
    pub encoding: FormEncoding,
}

impl FormDescriptor {
    /// Value submitted for `name`, if any.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Request a browser would send when this form is submitted.
    ///
    /// GET submissions replace the action's query string with the fields.
    pub fn to_request(&self) -> FetchRequest {
        let mut url = self.action.clone();
        if self.method == Method::Get {
            url.set_query(None);
        }
        FetchRequest {
            method: self.method,
            url,
            fields: self.fields.clone(),
            encoding: self.encoding,
        }
    }
}

/// One way a form control can contribute name/value pairs.
pub trait FieldExtractable {
    fn extract(&self) -> Vec<(String, String)>;
}

/// text, hidden, email, number, date, ... always contribute their value.
struct ValueInput<'a>(ElementRef<'a>);

/// radio and checkbox contribute only when checked.
struct ToggleInput<'a>(ElementRef<'a>);

/// The selected option(s) of a `<select>`.
struct SelectControl<'a>(ElementRef<'a>);

struct TextAreaControl<'a>(ElementRef<'a>);

/// The button that submits the form.
struct SubmitControl<'a>(ElementRef<'a>);

impl FieldExtractable for ValueInput<'_> {
    fn extract(&self) -> Vec<(String, String)> {
        named(self.0)
            .map(|name| vec![(name, attr(self.0, "value"))])
            .unwrap_or_default()
    }
}

impl FieldExtractable for ToggleInput<'_> {
    fn extract(&self) -> Vec<(String, String)> {
        if self.0.value().attr("checked").is_none() {
            return Vec::new();
        }
        let value = self.0.value().attr("value").unwrap_or("on").to_string();
        named(self.0)
            .map(|name| vec![(name, value)])
            .unwrap_or_default()
    }
}

impl FieldExtractable for SelectControl<'_> {
    fn extract(&self) -> Vec<(String, String)> {
        let Some(name) = named(self.0) else {
            return Vec::new();
        };
        let options: Vec<ElementRef> = self.0.select(&OPTION).collect();
        let selected: Vec<&ElementRef> = options
            .iter()
            .filter(|o| o.value().attr("selected").is_some())
            .collect();

        if self.0.value().attr("multiple").is_some() {
            return selected
                .into_iter()
                .map(|o| (name.clone(), option_value(*o)))
                .collect();
        }

        // Single select: last `selected` wins, else the first option.
        selected
            .last()
            .copied()
            .or_else(|| options.first())
            .map(|o| vec![(name, option_value(*o))])
            .unwrap_or_default()
    }
}

impl FieldExtractable for TextAreaControl<'_> {
    fn extract(&self) -> Vec<(String, String)> {
        let text: String = self.0.text().collect();
        let text = text.strip_prefix('\n').unwrap_or(&text).to_string();
        named(self.0)
            .map(|name| vec![(name, text)])
            .unwrap_or_default()
    }
}

impl FieldExtractable for SubmitControl<'_> {
    fn extract(&self) -> Vec<(String, String)> {
        named(self.0)
            .map(|name| vec![(name, attr(self.0, "value"))])
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlKind {
    Value,
    Toggle,
    Select,
    TextArea,
    Submit,
}

impl ControlKind {
    fn of(el: ElementRef) -> Option<Self> {
        let kind = el.value().attr("type").map(|t| t.trim().to_ascii_lowercase());
        match el.value().name() {
            "input" => match kind.as_deref().unwrap_or("text") {
                "radio" | "checkbox" => Some(ControlKind::Toggle),
                "submit" => Some(ControlKind::Submit),
                "image" | "reset" | "button" | "file" => None,
                _ => Some(ControlKind::Value),
            },
            "select" => Some(ControlKind::Select),
            "textarea" => Some(ControlKind::TextArea),
            "button" => match kind.as_deref().unwrap_or("submit") {
                "submit" => Some(ControlKind::Submit),
                _ => None,
            },
            _ => None,
        }
    }

    fn bind<'a>(self, el: ElementRef<'a>) -> Box<dyn FieldExtractable + 'a> {
        match self {
            ControlKind::Value => Box::new(ValueInput(el)),
            ControlKind::Toggle => Box::new(ToggleInput(el)),
            ControlKind::Select => Box::new(SelectControl(el)),
            ControlKind::TextArea => Box::new(TextAreaControl(el)),
            ControlKind::Submit => Box::new(SubmitControl(el)),
        }
    }
}

fn named(el: ElementRef) -> Option<String> {
    el.value()
        .attr("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn attr(el: ElementRef, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_string()
}

fn option_value(option: ElementRef) -> String {
    match option.value().attr("value") {
        Some(value) => value.to_string(),
        None => collapse_ws(&option.text().collect::<String>()),
    }
}

fn is_disabled(el: ElementRef) -> bool {
    if el.value().attr("disabled").is_some() {
        return true;
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "fieldset" && a.value().attr("disabled").is_some())
}

/// Find the first form in `fragment` and describe it.
///
/// `base` is the URL of the document the fragment came from; relative
/// actions resolve against it.
pub fn extract_form(fragment: &str, base: &Url) -> Result<FormDescriptor> {
    let html = Html::parse_fragment(fragment);
    let form = html.select(&FORM).next().ok_or(SyncError::NoFormFound)?;
    describe_form(form, base)
}

/// Describe an already-located `<form>` element.
pub fn describe_form(form: ElementRef, base: &Url) -> Result<FormDescriptor> {
    let mut fields: IndexMap<String, String> = IndexMap::new();
    let mut submitter: Option<ElementRef> = None;

    for el in form.select(&CONTROLS) {
        let Some(kind) = ControlKind::of(el) else {
            continue;
        };
        if is_disabled(el) {
            continue;
        }
        if kind == ControlKind::Submit {
            if submitter.is_some() || named(el).is_none() {
                continue;
            }
            submitter = Some(el);
        }
        for (name, value) in kind.bind(el).extract() {
            fields.insert(name, value);
        }
    }

    let attr_of = |name: &str| {
        submitter
            .and_then(|s| s.value().attr(&format!("form{name}")))
            .or_else(|| form.value().attr(name))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let action = match attr_of("action") {
        None => base.clone(),
        Some(action) => base.join(action).map_err(|_| SyncError::InvalidUrl {
            url: action.to_string(),
        })?,
    };

    let method = match attr_of("method").map(str::to_ascii_lowercase).as_deref() {
        Some("post") => Method::Post,
        _ => Method::Get,
    };

    let encoding = FormEncoding::from_enctype(attr_of("enctype"));

    Ok(FormDescriptor {
        action,
        method,
        fields: fields.into_iter().collect(),
        encoding,
    })
}

/// Submit a form through the session and return the resulting document.
pub async fn replay<F: Fetcher + ?Sized>(
    fetcher: &F,
    form: &FormDescriptor,
) -> FetchResult<Document> {
    debug!(
        action = %form.action,
        method = ?form.method,
        fields = form.fields.len(),
        "Replaying form"
    );
    fetcher.fetch(&form.to_request()).await
}
