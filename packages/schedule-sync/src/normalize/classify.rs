//! Event-type classification from title keywords.

use serde::{Deserialize, Serialize};

use crate::types::event::EventType;

/// Keywords that map a title to one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub event_type: EventType,
    /// Matched case-insensitively as substrings
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(event_type: EventType, keywords: &[&str]) -> Self {
        Self {
            event_type,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, title_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && title_lower.contains(&k.to_lowercase()))
    }
}

/// Ordered rule table. The first matching rule wins, so the order of the
/// rules is the tie-break for titles carrying several keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new(vec![
            KeywordRule::new(EventType::Invitational, &["invitational", "invite"]),
            KeywordRule::new(EventType::RelayMeet, &["relay"]),
            KeywordRule::new(EventType::Conference, &["conference"]),
            KeywordRule::new(EventType::Championship, &["sectional", "state"]),
            KeywordRule::new(EventType::Meeting, &["meeting"]),
            KeywordRule::new(
                EventType::Special,
                &["senior night", "banquet", "alumni", "exhibition"],
            ),
        ])
    }
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Event type for `title`. Never fails: no match means a dual meet.
    pub fn classify(&self, title: &str) -> EventType {
        let lower = title.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lower))
            .map(|rule| rule.event_type)
            .unwrap_or(EventType::DualMeet)
    }
}
