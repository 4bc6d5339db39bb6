//! Calendar publishing for the schedule sync.
//!
//! Renders the events produced by `schedule_sync` as an iCalendar feed and an
//! HTML schedule page, and writes both to disk through [`FileSink`].

pub mod config;
pub mod ics;
pub mod page;
pub mod sink;

pub use config::Config;
pub use ics::IcsFeed;
pub use page::HtmlPage;
pub use sink::{Artifacts, FileSink};
