use anyhow::{Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use schedule_sync::SyncConfig;
use std::env;
use std::path::{Path, PathBuf};

/// CLI configuration: the library's sync settings plus where and how the
/// calendar artifacts are published.
#[derive(Debug, Clone)]
pub struct Config {
    pub sync: SyncConfig,
    pub output_dir: PathBuf,
    pub calendar_name: String,
    pub uid_domain: String,
    /// Custom HTML template. The built-in page is used when unset.
    pub template_path: Option<PathBuf>,
    pub ics_file: String,
    pub html_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            output_dir: PathBuf::from("."),
            calendar_name: "ETHS Girls Swimming".to_string(),
            uid_domain: "eths-girls-swimming".to_string(),
            template_path: None,
            ics_file: "calendar.ics".to_string(),
            html_file: "index.html".to_string(),
        }
    }
}

impl Config {
    /// Start from an optional JSON `SyncConfig` file, then apply `SYNC_*`
    /// environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let sync = match config_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => SyncConfig::default(),
        };

        Self::from_lookup(sync, |key| env::var(key).ok())
    }

    /// Apply overrides from `lookup` on top of `sync`.
    pub fn from_lookup<F>(sync: SyncConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            sync,
            ..Self::default()
        };

        if let Some(base_url) = lookup("SYNC_BASE_URL") {
            config.sync.site.base_url = base_url;
        }
        if let Some(entry_path) = lookup("SYNC_ENTRY_PATH") {
            config.sync.site.entry_path = entry_path;
        }
        if let Some(listing_url) = lookup("SYNC_LISTING_URL") {
            config.sync.site.listing_url = Some(listing_url);
        }
        if let Some(home_venue) = lookup("SYNC_HOME_VENUE") {
            config.sync.home_venue = home_venue;
        }
        if let Some(year) = lookup("SYNC_SEASON_START_YEAR") {
            config.sync.season.start_year = year
                .parse()
                .context("SYNC_SEASON_START_YEAR must be a valid year")?;
        }
        if let Some(month) = lookup("SYNC_SEASON_CUTOVER_MONTH") {
            config.sync.season.cutover_month = month
                .parse()
                .context("SYNC_SEASON_CUTOVER_MONTH must be a valid number")?;
        }
        if let Some(tz) = lookup("SYNC_TIMEZONE") {
            config.sync.timezone = tz
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("SYNC_TIMEZONE must be an IANA timezone: {e}"))?;
        }
        if let Some(workers) = lookup("SYNC_DETAIL_CONCURRENCY") {
            config.sync.detail_concurrency = workers
                .parse()
                .context("SYNC_DETAIL_CONCURRENCY must be a valid number")?;
        }
        if let Some(dir) = lookup("SYNC_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("SYNC_CALENDAR_NAME") {
            config.calendar_name = name;
        }
        if let Some(domain) = lookup("SYNC_UID_DOMAIN") {
            config.uid_domain = domain;
        }
        config.template_path = lookup("SYNC_TEMPLATE").map(PathBuf::from);

        config
            .sync
            .validate()
            .context("invalid sync configuration")?;
        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn ics_path(&self) -> PathBuf {
        self.output_dir.join(&self.ics_file)
    }

    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(&self.html_file)
    }
}
