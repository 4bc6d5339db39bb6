//! Configuration for a sync run.

use chrono::{Datelike, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyncError};
use crate::normalize::classify::KeywordTable;

/// Where the schedule lives upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root, used to resolve relative links
    pub base_url: String,

    /// Landing page visited first to establish the session
    pub entry_path: String,

    /// Listing page. When unset it is discovered from the entry page.
    pub listing_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wildkitaquatics.com".to_string(),
            entry_path: "/main/EvanstonGirlsSwimming".to_string(),
            listing_url: None,
        }
    }
}

impl SiteConfig {
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|_| SyncError::InvalidUrl {
            url: self.base_url.clone(),
        })
    }

    pub fn entry(&self) -> Result<Url> {
        self.base()?
            .join(&self.entry_path)
            .map_err(|_| SyncError::InvalidUrl {
                url: self.entry_path.clone(),
            })
    }

    pub fn listing(&self) -> Result<Option<Url>> {
        match &self.listing_url {
            None => Ok(None),
            Some(listing) => self
                .base()?
                .join(listing)
                .map(Some)
                .map_err(|_| SyncError::InvalidUrl {
                    url: listing.clone(),
                }),
        }
    }
}

/// Season boundaries used to give bare month/day dates a year.
///
/// A season starting in `start_year` runs from `cutover_month` of that year
/// until the month before `cutover_month` of the next year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub start_year: i32,

    /// 1-12. Months before this belong to `start_year + 1`.
    pub cutover_month: u32,
}

impl SeasonConfig {
    pub fn new(start_year: i32, cutover_month: u32) -> Self {
        Self {
            start_year,
            cutover_month,
        }
    }

    /// The season that contains `date`.
    pub fn containing(date: NaiveDate, cutover_month: u32) -> Self {
        let start_year = if date.month() >= cutover_month {
            date.year()
        } else {
            date.year() - 1
        };
        Self::new(start_year, cutover_month)
    }

    /// Calendar year for a month within this season.
    pub fn year_for_month(&self, month: u32) -> i32 {
        if month < self.cutover_month {
            self.start_year + 1
        } else {
            self.start_year
        }
    }
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self::containing(chrono::Local::now().date_naive(), 7)
    }
}

/// Transport policy for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,

    /// Total attempts per request, including the first
    pub max_attempts: usize,

    pub min_backoff_ms: u64,

    pub max_backoff_ms: u64,

    pub user_agent: String,

    /// Request pacing. 0 disables pacing.
    pub requests_per_second: u32,

    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            min_backoff_ms: 500,
            max_backoff_ms: 5_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            requests_per_second: 2,
            max_redirects: 5,
        }
    }
}

/// Everything a run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub site: SiteConfig,

    pub season: SeasonConfig,

    /// Used when the detail page gives no end time
    pub default_duration_minutes: i64,

    /// Used when neither listing nor detail give a time
    pub default_start_time: NaiveTime,

    /// Civil timezone of the source's times
    pub timezone: Tz,

    /// Name or address fragment that marks a home venue
    pub home_venue: String,

    /// Ordered classification rules, first match wins
    pub keywords: KeywordTable,

    pub http: HttpConfig,

    /// Detail pages fetched at once
    pub detail_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            season: SeasonConfig::default(),
            default_duration_minutes: 120,
            default_start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: chrono_tz::America::Chicago,
            home_venue: "ETHS".to_string(),
            keywords: KeywordTable::default(),
            http: HttpConfig::default(),
            detail_concurrency: 4,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.site.base_url = base_url.into();
        self
    }

    pub fn with_entry_path(mut self, path: impl Into<String>) -> Self {
        self.site.entry_path = path.into();
        self
    }

    pub fn with_listing_url(mut self, listing: impl Into<String>) -> Self {
        self.site.listing_url = Some(listing.into());
        self
    }

    pub fn with_season(mut self, season: SeasonConfig) -> Self {
        self.season = season;
        self
    }

    pub fn with_home_venue(mut self, venue: impl Into<String>) -> Self {
        self.home_venue = venue.into();
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_default_duration_minutes(mut self, minutes: i64) -> Self {
        self.default_duration_minutes = minutes;
        self
    }

    pub fn with_default_start_time(mut self, time: NaiveTime) -> Self {
        self.default_start_time = time;
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_detail_concurrency(mut self, workers: usize) -> Self {
        self.detail_concurrency = workers;
        self
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        self.site.entry()?;
        self.site.listing()?;
        if !(1..=12).contains(&self.season.cutover_month) {
            return Err(SyncError::Config(format!(
                "season cutover month must be 1-12, got {}",
                self.season.cutover_month
            )));
        }
        if self.default_duration_minutes <= 0 {
            return Err(SyncError::Config(
                "default duration must be positive".to_string(),
            ));
        }
        if self.http.max_attempts == 0 {
            return Err(SyncError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.detail_concurrency == 0 {
            return Err(SyncError::Config(
                "detail_concurrency must be at least 1".to_string(),
            ));
        }
        if self.home_venue.trim().is_empty() {
            return Err(SyncError::Config("home venue must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_year_for_month() {
        let season = SeasonConfig::new(2025, 7);
        assert_eq!(season.year_for_month(8), 2025);
        assert_eq!(season.year_for_month(12), 2025);
        assert_eq!(season.year_for_month(1), 2026);
        assert_eq!(season.year_for_month(6), 2026);
        assert_eq!(season.year_for_month(7), 2025);
    }

    #[test]
    fn test_season_containing() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(SeasonConfig::containing(jan, 7).start_year, 2025);
        let oct = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(SeasonConfig::containing(oct, 7).start_year, 2026);
    }

    #[test]
    fn test_site_urls_resolve() {
        let config = SyncConfig::new()
            .with_base_url("https://example.com")
            .with_entry_path("/main/Team")
            .with_listing_url("/competitions");
        assert_eq!(
            config.site.entry().unwrap().as_str(),
            "https://example.com/main/Team"
        );
        assert_eq!(
            config.site.listing().unwrap().unwrap().as_str(),
            "https://example.com/competitions"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SyncConfig::new().validate().is_ok());
        assert!(SyncConfig::new()
            .with_season(SeasonConfig::new(2025, 13))
            .validate()
            .is_err());
        assert!(SyncConfig::new().with_detail_concurrency(0).validate().is_err());
        assert!(SyncConfig::new().with_home_venue("  ").validate().is_err());
        assert!(SyncConfig::new()
            .with_base_url("not a url")
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"home_venue": "Evanston HS", "detail_concurrency": 2}"#)
                .unwrap();
        assert_eq!(config.home_venue, "Evanston HS");
        assert_eq!(config.detail_concurrency, 2);
        assert_eq!(config.default_duration_minutes, 120);
    }
}
