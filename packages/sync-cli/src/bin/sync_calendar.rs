//! Sync the team schedule into a calendar feed and web page.
//!
//! Exits non-zero only on a hard failure. Rows that were skipped or degraded
//! are reported as warnings.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use schedule_sync::{HttpSession, Pipeline, SyncReport};
use sync_cli::{Config, FileSink};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Characters of each artifact shown in a dry run.
const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "sync-calendar")]
#[command(about = "Sync the competition schedule to an ICS feed and HTML page")]
struct Cli {
    /// Fetch and parse but do not write any files
    #[arg(long)]
    dry_run: bool,

    /// Debug logging and a per-event listing
    #[arg(short, long)]
    verbose: bool,

    /// Directory the calendar files are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON file with sync settings, applied before SYNC_* variables
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "debug,schedule_sync=debug,sync_cli=debug"
    } else {
        "info,schedule_sync=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }

    tracing::info!(
        entry = %config.sync.site.entry()?,
        output_dir = %config.output_dir.display(),
        dry_run = cli.dry_run,
        "Starting schedule sync"
    );

    let sink = Arc::new(FileSink::new(&config)?);
    let session = HttpSession::new(&config.sync.http).context("failed to build HTTP session")?;
    let mut pipeline = Pipeline::new(config.sync.clone()).with_sink(sink.clone());

    let report = pipeline
        .run(&session, cli.dry_run)
        .await
        .context("schedule sync failed")?;

    warn_soft_failures(&report);

    if cli.verbose {
        for event in &report.events {
            tracing::info!(
                date = %event.start_local.format("%a %b %-d %-I:%M %p"),
                event_type = event.event_type.label(),
                home = ?event.home,
                location = %event.location,
                degraded = event.degraded,
                "{}",
                event.title
            );
        }
    }

    if cli.dry_run {
        let artifacts = sink.render(&report.events, Utc::now());
        println!("Dry run: {} events, nothing written", report.events.len());
        println!("Would write {}", sink.ics_path().display());
        println!("Would write {}", sink.html_path().display());
        println!("\n--- {} ---\n{}", config.html_file, preview(&artifacts.html));
        println!("\n--- {} ---\n{}", config.ics_file, preview(&artifacts.ics));
    } else {
        println!(
            "Synced {} events to {} and {}",
            report.events.len(),
            sink.ics_path().display(),
            sink.html_path().display()
        );
    }

    Ok(())
}

fn warn_soft_failures(report: &SyncReport) {
    let diagnostics = &report.diagnostics;
    if diagnostics.soft_failures() == 0 {
        return;
    }

    tracing::warn!(
        rows_skipped = diagnostics.rows_skipped,
        events_dropped = diagnostics.events_dropped,
        duplicates_dropped = diagnostics.duplicates_dropped,
        details_degraded = diagnostics.details_degraded,
        "Completed with {} soft failures",
        diagnostics.soft_failures()
    );
    for skip in &diagnostics.skips {
        tracing::warn!(
            stage = ?skip.stage,
            row = skip.source_order,
            title = skip.title.as_deref().unwrap_or("-"),
            "{}",
            skip.reason
        );
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
