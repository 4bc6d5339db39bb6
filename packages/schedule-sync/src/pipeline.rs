//! Pipeline orchestration: session → listing → details → canonical events.
//!
//! A run walks a small state machine:
//!
//! ```text
//! Idle → SessionEstablished → ListingFetched → DetailResolving → Normalized → Done
//! ```
//!
//! with `Failed(kind)` reachable from every state. Soft failures (bad rows,
//! unreachable details, unparseable dates, duplicate ids) are counted in
//! [`Diagnostics`] and never abort the run. Sinks run only after the whole
//! event list is assembled, and never in dry-run mode.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::detail::{resolve, DetailStatus};
use crate::error::{FailureKind, Result, SkipReason, SyncError};
use crate::listing::{find_listing_link, ListingPage};
use crate::normalize::Normalizer;
use crate::session::Fetcher;
use crate::types::config::SyncConfig;
use crate::types::event::CanonicalEvent;
use crate::types::raw::RawEventStub;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SessionEstablished,
    ListingFetched,
    DetailResolving,
    Normalized,
    Done,
    Failed(FailureKind),
}

/// Which step dropped or degraded an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Listing,
    Detail,
    Normalize,
    Dedupe,
}

/// One entry in the per-item skip log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipEntry {
    pub stage: SkipStage,
    pub source_order: usize,
    pub title: Option<String>,
    pub reason: String,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Rows found on the listing page
    pub rows_seen: usize,

    /// Rows that could not be turned into a stub
    pub rows_skipped: usize,

    /// Detail pages fetched and parsed
    pub details_fetched: usize,

    /// Detail fetches that failed; those events use listing fields only
    pub details_degraded: usize,

    /// Rows with no detail link or form
    pub details_absent: usize,

    /// Events dropped because no date could be parsed
    pub events_dropped: usize,

    /// Later events dropped for reusing an earlier id
    pub duplicates_dropped: usize,

    /// Per-item record of everything counted above as a failure
    pub skips: Vec<SkipEntry>,
}

impl Diagnostics {
    /// Items that were left out of the result entirely.
    pub fn dropped(&self) -> usize {
        self.rows_skipped + self.events_dropped + self.duplicates_dropped
    }

    /// Every soft failure, including degraded details.
    pub fn soft_failures(&self) -> usize {
        self.dropped() + self.details_degraded
    }

    fn skip(&mut self, stage: SkipStage, source_order: usize, title: Option<&str>, reason: String) {
        self.skips.push(SkipEntry {
            stage,
            source_order,
            title: title.map(str::to_string),
            reason,
        });
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Canonical events in chronological order
    pub events: Vec<CanonicalEvent>,

    pub diagnostics: Diagnostics,

    pub dry_run: bool,

    /// Whether sinks were invoked
    pub published: bool,
}

/// Destination for the assembled events (calendar feed, web page, ...).
#[async_trait]
pub trait CalendarSink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Publish the complete, ordered event list.
    async fn publish(&self, events: &[CanonicalEvent]) -> Result<()>;
}

/// Drives one extraction run.
pub struct Pipeline {
    config: SyncConfig,
    normalizer: Normalizer,
    sinks: Vec<Arc<dyn CalendarSink>>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            normalizer: Normalizer::new(&config),
            config,
            sinks: Vec::new(),
            state: PipelineState::Idle,
        }
    }

    /// Add a sink to publish to after a non-dry run.
    pub fn with_sink(mut self, sink: Arc<dyn CalendarSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline state");
        self.state = next;
    }

    /// Run the full extraction.
    ///
    /// Network reads always happen. With `dry_run` set no sink is called.
    pub async fn run<F: Fetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        dry_run: bool,
    ) -> Result<SyncReport> {
        self.state = PipelineState::Idle;
        match self.execute(fetcher, dry_run).await {
            Ok(report) => {
                self.transition(PipelineState::Done);
                info!(
                    events = report.events.len(),
                    rows_seen = report.diagnostics.rows_seen,
                    soft_failures = report.diagnostics.soft_failures(),
                    dry_run,
                    published = report.published,
                    "Sync complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(PipelineState::Failed(e.kind()));
                error!(error = %e, "Sync failed");
                Err(e)
            }
        }
    }

    async fn execute<F: Fetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        dry_run: bool,
    ) -> Result<SyncReport> {
        self.config.validate()?;
        let mut diagnostics = Diagnostics::default();

        // 1. Entry page sets the session cookies
        let entry_url = self.config.site.entry()?;
        info!(url = %entry_url, "Fetching entry page");
        let entry = fetcher.get(&entry_url).await?;
        self.transition(PipelineState::SessionEstablished);

        // 2. Listing
        let listing_url = match self.config.site.listing()? {
            Some(url) => url,
            None => find_listing_link(&entry).ok_or_else(|| SyncError::PageStructure {
                url: entry.url.to_string(),
                reason: "no competitions link".to_string(),
            })?,
        };
        info!(url = %listing_url, "Fetching listing page");
        let listing_doc = fetcher.get(&listing_url).await?;
        let page = ListingPage::parse(&listing_doc);
        if page.is_empty() {
            // A login or error page served in place of the listing
            return Err(SyncError::PageStructure {
                url: listing_doc.url.to_string(),
                reason: "no event rows".to_string(),
            });
        }
        diagnostics.rows_seen = page.len();
        self.transition(PipelineState::ListingFetched);

        let mut stubs: Vec<RawEventStub> = Vec::with_capacity(page.len());
        for (order, stub) in page.stubs().enumerate() {
            match stub {
                Ok(stub) => stubs.push(stub),
                Err(reason) => {
                    warn!(order, reason = %reason, "Skipping listing row");
                    diagnostics.rows_skipped += 1;
                    diagnostics.skip(SkipStage::Listing, order, None, reason.to_string());
                }
            }
        }

        // 3. Details, bounded concurrency, order restored afterwards
        self.transition(PipelineState::DetailResolving);
        let workers = self.config.detail_concurrency.max(1);
        let mut resolved: Vec<_> = stream::iter(stubs)
            .map(|stub| async move {
                let detail = resolve(fetcher, &stub).await;
                (stub, detail)
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        resolved.sort_by_key(|(stub, _)| stub.source_order);

        // 4. Normalize, dedupe, order
        let mut events = Vec::with_capacity(resolved.len());
        let mut seen_ids = HashSet::new();
        for (stub, detail) in resolved {
            match detail.status {
                DetailStatus::Fetched => diagnostics.details_fetched += 1,
                DetailStatus::Absent => diagnostics.details_absent += 1,
                DetailStatus::Failed(ref e) => {
                    diagnostics.details_degraded += 1;
                    diagnostics.skip(
                        SkipStage::Detail,
                        stub.source_order,
                        Some(stub.title.as_str()),
                        e.to_string(),
                    );
                }
            }

            let event = match self.normalizer.normalize(&stub, &detail.record) {
                Ok(event) => event,
                Err(reason) => {
                    warn!(title = %stub.title, reason = %reason, "Dropping event");
                    diagnostics.events_dropped += 1;
                    diagnostics.skip(
                        SkipStage::Normalize,
                        stub.source_order,
                        Some(stub.title.as_str()),
                        reason.to_string(),
                    );
                    continue;
                }
            };

            if !seen_ids.insert(event.id.clone()) {
                let reason = SkipReason::DuplicateId { id: event.id.clone() };
                warn!(title = %event.title, reason = %reason, "Dropping duplicate event");
                diagnostics.duplicates_dropped += 1;
                diagnostics.skip(
                    SkipStage::Dedupe,
                    stub.source_order,
                    Some(event.title.as_str()),
                    reason.to_string(),
                );
                continue;
            }
            events.push(event);
        }
        events.sort_by_key(CanonicalEvent::sort_key);
        self.transition(PipelineState::Normalized);

        if events.is_empty() {
            return Err(SyncError::EmptyResult {
                rows_seen: diagnostics.rows_seen,
                skipped: diagnostics.dropped(),
            });
        }

        // 5. Publish
        let published = if dry_run {
            info!(sinks = self.sinks.len(), "Dry run, not publishing");
            false
        } else {
            for sink in &self.sinks {
                info!(sink = sink.name(), events = events.len(), "Publishing");
                sink.publish(&events).await?;
            }
            true
        };

        Ok(SyncReport {
            events,
            diagnostics,
            dry_run,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, RecordingSink};
    use crate::types::config::SeasonConfig;

    const ENTRY: &str = "https://swim.example.org/main/Team";
    const LISTING: &str = "https://swim.example.org/main/Competitions";

    fn config() -> SyncConfig {
        SyncConfig::new()
            .with_base_url("https://swim.example.org")
            .with_entry_path("/main/Team")
            .with_season(SeasonConfig::new(2025, 7))
            .with_home_venue("Evanston HS")
    }

    fn fetcher(listing: &str) -> MockFetcher {
        MockFetcher::new()
            .with_page(ENTRY, r#"<a href="/main/Competitions">Competitions</a>"#)
            .with_page(LISTING, listing)
    }

    const ONE_EVENT: &str =
        r#"<div class="event"><h3>vs New Trier</h3><span class="date">Jan 9</span></div>"#;

    #[tokio::test]
    async fn test_state_machine_reaches_done() {
        let fetcher = fetcher(ONE_EVENT);
        let mut pipeline = Pipeline::new(config());
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let report = pipeline.run(&fetcher, true).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.diagnostics.details_absent, 1);
    }

    #[tokio::test]
    async fn test_missing_competitions_link_is_structure_failure() {
        let fetcher = MockFetcher::new().with_page(ENTRY, "<p>Welcome</p>");
        let mut pipeline = Pipeline::new(config());
        let err = pipeline.run(&fetcher, true).await.unwrap_err();
        assert!(matches!(err, SyncError::PageStructure { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed(FailureKind::Structure));
    }

    #[tokio::test]
    async fn test_listing_without_rows_is_structure_failure() {
        let fetcher = fetcher("<form><p>Please log in</p><input name=\"user\"></form>");
        let mut pipeline = Pipeline::new(config());
        let err = pipeline.run(&fetcher, true).await.unwrap_err();
        match err {
            SyncError::PageStructure { url, reason } => {
                assert_eq!(url, LISTING);
                assert_eq!(reason, "no event rows");
            }
            other => panic!("expected structure failure, got {other:?}"),
        }
        assert_eq!(pipeline.state(), PipelineState::Failed(FailureKind::Structure));
    }

    #[tokio::test]
    async fn test_entry_failure_is_transport_failure() {
        let mut pipeline = Pipeline::new(config());
        let err = pipeline.run(&MockFetcher::new(), true).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed(FailureKind::Transport));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_network() {
        let fetcher = MockFetcher::new();
        let mut pipeline = Pipeline::new(config().with_detail_concurrency(0));
        let err = pipeline.run(&fetcher, true).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_publish_failure() {
        let fetcher = fetcher(ONE_EVENT);
        let mut pipeline = Pipeline::new(config()).with_sink(Arc::new(RecordingSink::failing()));
        let err = pipeline.run(&fetcher, false).await.unwrap_err();
        assert!(matches!(err, SyncError::Publish(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed(FailureKind::Publish));
    }
}
