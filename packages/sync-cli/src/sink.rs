//! Writes the calendar feed and schedule page to disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedule_sync::{CalendarSink, CanonicalEvent, SyncError};
use tracing::info;

use crate::config::Config;
use crate::ics::IcsFeed;
use crate::page::HtmlPage;

/// Both rendered artifacts, held in memory until they are written.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub ics: String,
    pub html: String,
}

/// Publishes events as `calendar.ics` and `index.html` in the output
/// directory.
pub struct FileSink {
    feed: IcsFeed,
    page: HtmlPage,
    ics_path: PathBuf,
    html_path: PathBuf,
}

impl FileSink {
    pub fn new(config: &Config) -> Result<Self> {
        let mut page = HtmlPage::new(&config.calendar_name, config.sync.timezone);
        if let Some(path) = &config.template_path {
            let template = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display()))?;
            page = page.with_template(template);
        }

        Ok(Self {
            feed: IcsFeed::new(&config.calendar_name, &config.uid_domain, config.sync.timezone),
            page,
            ics_path: config.ics_path(),
            html_path: config.html_path(),
        })
    }

    pub fn ics_path(&self) -> &Path {
        &self.ics_path
    }

    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    pub fn render(&self, events: &[CanonicalEvent], now: DateTime<Utc>) -> Artifacts {
        Artifacts {
            ics: self.feed.render(events, now),
            html: self.page.render(events, now),
        }
    }
}

#[async_trait]
impl CalendarSink for FileSink {
    fn name(&self) -> &str {
        "files"
    }

    async fn publish(&self, events: &[CanonicalEvent]) -> schedule_sync::error::Result<()> {
        let artifacts = self.render(events, Utc::now());

        // Stage both files before renaming either into place.
        let ics_tmp = staging_path(&self.ics_path);
        let html_tmp = staging_path(&self.html_path);
        let staged = async {
            tokio::fs::write(&ics_tmp, &artifacts.ics).await?;
            tokio::fs::write(&html_tmp, &artifacts.html).await?;
            tokio::fs::rename(&ics_tmp, &self.ics_path).await?;
            tokio::fs::rename(&html_tmp, &self.html_path).await
        }
        .await;

        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&ics_tmp).await;
            let _ = tokio::fs::remove_file(&html_tmp).await;
            return Err(SyncError::Publish(Box::new(e)));
        }

        info!(
            ics = %self.ics_path.display(),
            html = %self.html_path.display(),
            events = events.len(),
            "Calendar files written"
        );
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use schedule_sync::{EventType, HomeStatus};

    fn events() -> Vec<CanonicalEvent> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 9)
            .unwrap()
            .and_hms_opt(16, 30, 0)
            .unwrap();
        vec![CanonicalEvent {
            id: "20260109-0123456789ab".into(),
            title: "vs New Trier".into(),
            start_local: start,
            end_local: start + chrono::Duration::hours(2),
            location: "Evanston HS Pool".into(),
            home: HomeStatus::Home,
            event_type: EventType::DualMeet,
            description: None,
            source_order: 0,
            degraded: false,
        }]
    }

    #[tokio::test]
    async fn test_publish_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_output_dir(dir.path());
        let sink = FileSink::new(&config).unwrap();

        sink.publish(&events()).await.unwrap();

        let ics = std::fs::read_to_string(dir.path().join("calendar.ics")).unwrap();
        let html = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(ics.contains("SUMMARY:ETHS Girls Swimming - vs New Trier"));
        assert!(html.contains("vs New Trier"));
        assert!(!dir.path().join("calendar.ics.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_publish_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_output_dir(dir.path().join("missing"));
        let sink = FileSink::new(&config).unwrap();

        let err = sink.publish(&events()).await.unwrap_err();
        assert!(matches!(err, SyncError::Publish(_)));
        assert!(!config.ics_path().exists());
        assert!(!config.html_path().exists());
    }

    #[test]
    fn test_custom_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("page.html");
        std::fs::write(&template, "<ul>{{competitions}}</ul><p>{{total}}</p>").unwrap();

        let config = Config {
            template_path: Some(template),
            ..Config::default()
        };
        let now = Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap();
        let artifacts = FileSink::new(&config).unwrap().render(&events(), now);
        assert!(artifacts.html.starts_with("<ul>"));
        assert!(artifacts.html.ends_with("<p>1</p>"));
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let config = Config {
            template_path: Some(PathBuf::from("/nonexistent/page.html")),
            ..Config::default()
        };
        assert!(FileSink::new(&config).is_err());
    }
}
