//! Downloader for remote-only media.
//!
//! Walks the catalog's remote-only entries in modify-date order, fetches
//! each file that is not yet on disk and stamps it with the remote dates:
//! modified time from the modify date, access time from the create date.

pub mod error;
pub mod file;
pub mod paths;

use std::fs::FileTimes;
use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use self::error::DownloadError;
use crate::catalog::{LocalCatalog, MediaRecord};
use crate::retry::RetryConfig;

/// Subset of application config consumed by the downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Only entries modified on or after this date.
    pub start_date: Option<DateTime<Utc>>,
    /// Only entries modified on or before this date.
    pub end_date: Option<DateTime<Utc>>,
    pub retry: RetryConfig,
    pub quiet: bool,
    pub no_progress_bar: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: u64,
    pub already_present: u64,
    pub failed: u64,
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when disabled or when stdout is not a TTY.
fn create_progress_bar(disabled: bool, total: u64) -> ProgressBar {
    if disabled || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Download every remote-only entry in the configured date range that is
/// missing from disk. Individual failures are logged and counted.
pub async fn download_remote_media(
    catalog: &dyn LocalCatalog,
    client: &Client,
    config: &DownloadConfig,
    shutdown_token: CancellationToken,
) -> Result<DownloadSummary> {
    tracing::info!("Downloading remote-only files ...");
    let started = Instant::now();
    let entries = catalog
        .remote_media(config.start_date, config.end_date)
        .await?;

    let mut summary = DownloadSummary::default();
    let pending: Vec<&MediaRecord> = entries
        .iter()
        .filter(|media| {
            let present = media.local_path().exists();
            if present {
                summary.already_present += 1;
            }
            !present
        })
        .collect();

    let pb = create_progress_bar(config.quiet || config.no_progress_bar, pending.len() as u64);
    for media in pending {
        if shutdown_token.is_cancelled() {
            pb.suspend(|| tracing::info!("Shutdown requested, stopping downloads"));
            break;
        }
        let path = media.local_path();
        if !config.quiet {
            pb.suspend(|| tracing::info!("  Downloading {} ...", path.display()));
        }
        match download_one(client, media, &config.retry).await {
            Ok(()) => summary.downloaded += 1,
            Err(e) => {
                summary.failed += 1;
                pb.suspend(|| tracing::warn!("  Failed to download {}: {}", path.display(), e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    tracing::info!("── Download Summary ──");
    tracing::info!(
        "  {} downloaded, {} failed, {} already present",
        summary.downloaded,
        summary.failed,
        summary.already_present
    );
    tracing::info!("  elapsed: {}", format_duration(started.elapsed()));
    Ok(summary)
}

async fn download_one(
    client: &Client,
    media: &MediaRecord,
    retry: &RetryConfig,
) -> Result<(), DownloadError> {
    let path = media.local_path();
    let url = media
        .url
        .as_deref()
        .ok_or_else(|| DownloadError::MissingUrl(path.display().to_string()))?;

    tokio::fs::create_dir_all(&media.folder).await?;
    file::download_file(client, url, &path, retry).await?;

    if let Err(e) = set_file_times(&path, media.modify_date, media.create_date) {
        tracing::warn!("Could not set times on {}: {}", path.display(), e);
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn system_time(date: DateTime<Utc>) -> SystemTime {
    let timestamp = date.timestamp();
    if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(timestamp.unsigned_abs()))
            .unwrap_or(UNIX_EPOCH)
    }
}

/// Modified time from `modified`, access time from `created`. Nothing else
/// on common filesystems holds a creation date, so atime carries it.
fn set_file_times(
    path: &Path,
    modified: DateTime<Utc>,
    created: DateTime<Utc>,
) -> std::io::Result<()> {
    let times = FileTimes::new()
        .set_modified(system_time(modified))
        .set_accessed(system_time(created));
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(times)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::catalog::db::tests::{date, local_entry};
    use crate::catalog::{MediaSource, SqliteCatalog};

    fn test_tmp_dir(subdir: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("albumsync").join(subdir);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config() -> DownloadConfig {
        DownloadConfig {
            start_date: None,
            end_date: None,
            retry: RetryConfig {
                max_retries: 0,
                base_delay_secs: 0,
                max_delay_secs: 0,
            },
            quiet: true,
            no_progress_bar: true,
        }
    }

    #[test]
    fn test_set_file_times() {
        let dir = test_tmp_dir("file_times");
        let path = dir.join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let modified = date(2017, 6, 2, 9);
        let created = date(2017, 6, 1, 10);
        set_file_times(&path, modified, created).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.modified().unwrap(), system_time(modified));
        assert_eq!(meta.accessed().unwrap(), system_time(created));
    }

    #[test]
    fn test_set_file_times_nonexistent_file() {
        let path = test_tmp_dir("file_times_missing").join("nope.jpg");
        assert!(set_file_times(&path, date(2017, 1, 1, 0), date(2017, 1, 1, 0)).is_err());
    }

    #[test]
    fn test_system_time_before_epoch() {
        let before = DateTime::<Utc>::UNIX_EPOCH - chrono::Duration::seconds(10);
        assert_eq!(
            system_time(before),
            UNIX_EPOCH - Duration::from_secs(10)
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 01s");
        assert_eq!(format_duration(Duration::from_secs(5025)), "1h 23m 45s");
    }

    #[test]
    fn test_create_progress_bar_hidden_when_disabled() {
        assert!(create_progress_bar(true, 100).is_hidden());
    }

    #[tokio::test]
    async fn test_existing_files_are_not_downloaded() {
        let dir = test_tmp_dir("download_existing");
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut entry = local_entry("R1", "a.jpg", 1, date(2017, 6, 1, 0));
        entry.source = MediaSource::RemoteOnly;
        entry.folder = dir.clone();
        entry.url = Some("http://127.0.0.1:1/a".into());
        std::fs::write(entry.local_path(), b"x").unwrap();
        db.upsert_media(&entry).await.unwrap();

        let summary = download_remote_media(&db, &Client::new(), &config(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            summary,
            DownloadSummary {
                downloaded: 0,
                already_present: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_download_counted_not_fatal() {
        let dir = test_tmp_dir("download_failed");
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut entry = local_entry("R1", "a.jpg", 1, date(2017, 6, 1, 0));
        entry.source = MediaSource::RemoteOnly;
        entry.folder = dir.join("2017").join("06");
        entry.url = Some("http://127.0.0.1:1/a".into());
        db.upsert_media(&entry).await.unwrap();

        let summary = download_remote_media(&db, &Client::new(), &config(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert!(entry.folder.is_dir());
        assert!(!entry.local_path().exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_downloads_nothing() {
        let dir = test_tmp_dir("download_cancelled");
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut entry = local_entry("R1", "a.jpg", 1, date(2017, 6, 1, 0));
        entry.source = MediaSource::RemoteOnly;
        entry.folder = dir.join("sub");
        entry.url = Some("http://127.0.0.1:1/a".into());
        db.upsert_media(&entry).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let summary = download_remote_media(&db, &Client::new(), &config(), token)
            .await
            .unwrap();
        assert_eq!(summary, DownloadSummary::default());
        assert!(!entry.folder.exists());
    }
}
