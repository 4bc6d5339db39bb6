//! HTML schedule page rendering.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use schedule_sync::{CanonicalEvent, EventType, HomeStatus};

/// Page used when no template file is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/calendar.html");

const CLOCK_ICON: &str = r#"<svg width="16" height="16" fill="currentColor" viewBox="0 0 20 20"><path fill-rule="evenodd" d="M10 18a8 8 0 100-16 8 8 0 000 16zm1-12a1 1 0 10-2 0v4a1 1 0 00.293.707l2.828 2.829a1 1 0 101.415-1.415L11 9.586V6z" clip-rule="evenodd"></path></svg>"#;
const PIN_ICON: &str = r#"<svg width="16" height="16" fill="currentColor" viewBox="0 0 20 20"><path fill-rule="evenodd" d="M5.05 4.05a7 7 0 119.9 9.9L10 18.9l-4.95-4.95a7 7 0 010-9.9zM10 11a2 2 0 100-4 2 2 0 000 4z" clip-rule="evenodd"></path></svg>"#;

/// Renders the competition list into an HTML template.
///
/// Placeholders: `{{competitions}}`, `{{total}}`, `{{updated}}` and
/// `{{calendar_name}}`.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    calendar_name: String,
    template: String,
    timezone: Tz,
}

impl HtmlPage {
    pub fn new(calendar_name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            calendar_name: calendar_name.into(),
            template: DEFAULT_TEMPLATE.to_string(),
            timezone,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn render(&self, events: &[CanonicalEvent], now: DateTime<Utc>) -> String {
        let cards: String = events.iter().map(event_card).collect();
        let updated = now
            .with_timezone(&self.timezone)
            .format("%B %-d, %Y at %-I:%M %p %Z")
            .to_string();

        self.template
            .replace("{{competitions}}", &cards)
            .replace("{{total}}", &events.len().to_string())
            .replace("{{updated}}", &escape_html(&updated))
            .replace("{{calendar_name}}", &escape_html(&self.calendar_name))
    }
}

/// CSS modifier for the type badge. Dual meets use the plain badge.
pub fn type_class(event_type: EventType) -> &'static str {
    match event_type {
        EventType::DualMeet => "",
        EventType::Invitational => "invitational",
        EventType::RelayMeet => "relay",
        EventType::Conference => "conference",
        EventType::Championship => "championship",
        EventType::Meeting => "meeting",
        EventType::Special => "special",
    }
}

fn event_card(event: &CanonicalEvent) -> String {
    let location = escape_html(&event.location);
    let home = match event.home {
        HomeStatus::Home => r#" <span class="home-indicator">(Home)</span>"#,
        HomeStatus::Away | HomeStatus::Unknown => "",
    };
    let class = match type_class(event.event_type) {
        "" => "comp-type".to_string(),
        modifier => format!("comp-type {modifier}"),
    };

    format!(
        r#"        <div class="competition-card">
            <div class="comp-date">{date}</div>
            <div class="comp-time">{CLOCK_ICON} {time}</div>
            <h3 class="comp-name">{title}</h3>
            <div class="comp-location">{PIN_ICON} <span title="{location}">{location}</span>{home}</div>
            <span class="{class}">{label}</span>
        </div>
"#,
        date = event.start_local.format("%A, %B %-d, %Y"),
        time = event.start_local.format("%-I:%M %p"),
        title = escape_html(&event.title),
        label = event.event_type.label(),
    )
}

/// Escape text for element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
