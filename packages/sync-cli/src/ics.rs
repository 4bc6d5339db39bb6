//! iCalendar (RFC 5545) feed rendering.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use schedule_sync::CanonicalEvent;

/// Content lines longer than this many octets are folded.
const MAX_LINE_OCTETS: usize = 75;

/// Renders events as a subscribable calendar feed.
#[derive(Debug, Clone)]
pub struct IcsFeed {
    calendar_name: String,
    uid_domain: String,
    timezone: Tz,
}

impl IcsFeed {
    pub fn new(
        calendar_name: impl Into<String>,
        uid_domain: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            calendar_name: calendar_name.into(),
            uid_domain: uid_domain.into(),
            timezone,
        }
    }

    /// Render the whole feed. `now` becomes every event's `DTSTAMP`.
    pub fn render(&self, events: &[CanonicalEvent], now: DateTime<Utc>) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!(
                "PRODID:-//{}//{}//EN",
                self.uid_domain,
                escape_text(&self.calendar_name)
            ),
            "CALSCALE:GREGORIAN".to_string(),
            "METHOD:PUBLISH".to_string(),
            format!("X-WR-CALNAME:{}", escape_text(&self.calendar_name)),
            format!("X-WR-TIMEZONE:{}", self.timezone.name()),
        ];

        let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        for event in events {
            let mut description = format!("{} {}", self.calendar_name, event.event_type.label());
            if let Some(extra) = &event.description {
                description.push_str("\n\n");
                description.push_str(extra);
            }

            lines.extend([
                "BEGIN:VEVENT".to_string(),
                format!("UID:{}@{}", event.id, self.uid_domain),
                format!("DTSTAMP:{stamp}"),
                format!("DTSTART:{}", utc_stamp(event.start_in(self.timezone))),
                format!("DTEND:{}", utc_stamp(event.end_in(self.timezone))),
                format!(
                    "SUMMARY:{}",
                    escape_text(&format!("{} - {}", self.calendar_name, event.title))
                ),
                format!("LOCATION:{}", escape_text(&event.location)),
                format!("DESCRIPTION:{}", escape_text(&description)),
                "STATUS:CONFIRMED".to_string(),
                "TRANSP:TRANSPARENT".to_string(),
                "SEQUENCE:0".to_string(),
                "END:VEVENT".to_string(),
            ]);
        }
        lines.push("END:VCALENDAR".to_string());

        lines.iter().map(|line| fold_line(line) + "\r\n").collect()
    }
}

fn utc_stamp(dt: DateTime<Tz>) -> String {
    dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT value.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Fold a content line at 75 octets without splitting a UTF-8 sequence.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut used = 0;
    for c in line.chars() {
        // Continuation lines start with a space, which counts toward the limit.
        if used + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            used = 1;
        }
        out.push(c);
        used += c.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone};
    use schedule_sync::{EventType, HomeStatus};

    fn event(title: &str, start: NaiveDateTime) -> CanonicalEvent {
        CanonicalEvent {
            id: "20260109-abcdef012345".into(),
            title: title.into(),
            start_local: start,
            end_local: start + Duration::hours(2),
            location: "Evanston HS Pool".into(),
            home: HomeStatus::Home,
            event_type: EventType::DualMeet,
            description: None,
            source_order: 0,
            degraded: false,
        }
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn feed() -> IcsFeed {
        IcsFeed::new("ETHS Girls Swimming", "eths-swim.example", chrono_tz::America::Chicago)
    }

    #[test]
    fn test_render_feed() {
        let now = Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap();
        let ics = feed().render(&[event("vs New Trier", local(2026, 1, 9, 17))], now);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("PRODID:-//eths-swim.example//ETHS Girls Swimming//EN\r\n"));
        assert!(ics.contains("X-WR-TIMEZONE:America/Chicago\r\n"));
        assert!(ics.contains("UID:20260109-abcdef012345@eths-swim.example\r\n"));
        assert!(ics.contains("DTSTAMP:20251201T120000Z\r\n"));
        // 5 PM CST is 23:00 UTC
        assert!(ics.contains("DTSTART:20260109T230000Z\r\n"));
        assert!(ics.contains("DTEND:20260110T010000Z\r\n"));
        assert!(ics.contains("SUMMARY:ETHS Girls Swimming - vs New Trier\r\n"));
        assert!(ics.contains("DESCRIPTION:ETHS Girls Swimming Dual Meet\r\n"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    }

    #[test]
    fn test_daylight_time_offset() {
        // Early September is CDT, five hours behind UTC
        let ics = feed().render(&[event("vs Loyola", local(2025, 9, 5, 17))], Utc::now());
        assert!(ics.contains("DTSTART:20250905T220000Z\r\n"));
    }

    #[test]
    fn test_spring_forward_gap_moves_forward() {
        let ics = feed().render(&[event("vs Loyola", local(2026, 3, 8, 2))], Utc::now());
        assert!(ics.contains("DTSTART:20260308T080000Z\r\n"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }

    #[test]
    fn test_fold_long_lines() {
        let line = format!("DESCRIPTION:{}", "x".repeat(200));
        let folded = fold_line(&line);
        for part in folded.split("\r\n") {
            assert!(part.len() <= MAX_LINE_OCTETS);
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn test_fold_keeps_multibyte_chars_whole() {
        let line = format!("LOCATION:{}", "é".repeat(60));
        let folded = fold_line(&line);
        assert!(folded.split("\r\n").all(|part| part.len() <= MAX_LINE_OCTETS));
        assert_eq!(folded.replace("\r\n ", ""), line);
    }
}
