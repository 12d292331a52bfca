use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

use crate::cli::{GlobalArgs, SyncArgs};
use crate::indexer::ScanFilter;
use crate::retry::RetryConfig;

const DEFAULT_DB_NAME: &str = "albumsync.db";
const DOWNLOAD_ATTEMPTS: u32 = 5;

/// Locations shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_cli(global: &GlobalArgs) -> Self {
        let root = expand_tilde(&global.root);
        let db_path = global
            .db
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| root.join(DEFAULT_DB_NAME));
        Self { root, db_path }
    }
}

/// Settings for the `sync` subcommand.
pub struct SyncConfig {
    pub filter: ScanFilter,
    pub feed_url: String,
    pub access_token: Option<String>,
    pub album_limit: Option<u32>,
    pub feed_retry: RetryConfig,
    pub download_retry: RetryConfig,
    pub index_all_photos: bool,
    pub skip_download: bool,
    pub skip_links: bool,
    pub remove_orphans: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("filter", &self.filter)
            .field("feed_url", &self.feed_url)
            .field("access_token", &"<redacted>")
            .field("album_limit", &self.album_limit)
            .field("feed_retry", &self.feed_retry)
            .finish_non_exhaustive()
    }
}

impl SyncConfig {
    pub fn from_cli(args: SyncArgs) -> anyhow::Result<Self> {
        let start_date = args
            .start_date
            .as_deref()
            .map(parse_date_or_interval)
            .transpose()?;
        let end_date = args
            .end_date
            .as_deref()
            .map(parse_date_or_interval)
            .transpose()?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                anyhow::bail!("--start-date {} is after --end-date {}", start, end);
            }
        }

        Ok(Self {
            filter: ScanFilter {
                album_name: args.album,
                start_date,
                end_date,
                include_video: args.include_video,
                quiet: args.quiet,
            },
            feed_url: args.feed_url,
            access_token: args.access_token,
            album_limit: args.album_limit,
            feed_retry: RetryConfig {
                max_retries: args.max_retries,
                base_delay_secs: args.retry_delay,
                ..RetryConfig::default()
            },
            download_retry: RetryConfig::with_attempts(DOWNLOAD_ATTEMPTS, args.retry_delay),
            index_all_photos: args.index_all_photos,
            skip_download: args.skip_download,
            skip_links: args.skip_links,
            remove_orphans: args.remove_orphans,
            no_progress_bar: args.no_progress_bar,
        })
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Parse a human-friendly date into a UTC timestamp.
///
/// Supports three formats:
/// - Relative interval: `"20d"` (20 days ago from now)
/// - ISO date: `"2025-01-02"` (midnight local time)
/// - ISO datetime: `"2025-01-02T14:30:00"` (local time)
pub(crate) fn parse_date_or_interval(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Some(days_str) = s.strip_suffix('d') {
        if let Ok(days) = days_str.parse::<i64>() {
            return Ok(Utc::now() - chrono::Duration::days(days));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive_dt) = date.and_hms_opt(0, 0, 0) {
            if let Some(dt) = naive_dt.and_local_timezone(Local).single() {
                return Ok(dt.with_timezone(&Utc));
            }
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        if let Some(local) = dt.and_local_timezone(Local).single() {
            return Ok(local.with_timezone(&Utc));
        }
    }
    anyhow::bail!(
        "Cannot parse '{}' as a date. Expected ISO date (2025-01-02), \
         datetime (2025-01-02T14:30:00), or interval (20d)",
        s
    )
}
