//! Album and photo indexing: walks the remote catalog, matches each photo
//! against the local reference catalog and records remote-only entries,
//! album links and scan watermarks.

pub mod albums;
pub mod all_photos;
mod paging;
mod skip;

#[cfg(test)]
pub(crate) mod fake;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::catalog::{LocalCatalog, MediaRecord, MediaSource};
use crate::download::paths::{clean_filename, remote_media_folder};
use crate::remote::{RemoteCatalog, RemotePhoto};
use crate::retry::RetryConfig;

pub use albums::AlbumIndexer;
pub use all_photos::index_all_photos;

/// Albums that are never indexed.
pub const HIDDEN_ALBUMS: &[&str] = &["Profile Photos"];

/// Catch-all albums whose contents grow without bound. They are rescanned
/// on every run and left out of the album link tree.
pub const ALWAYS_RESCAN_ALBUMS: &[&str] = &["Auto Backup"];

/// The filter values the indexer consumes.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Only index the album with exactly this name.
    pub album_name: Option<String>,
    /// Inclusive lower bound on album modify date. Also disables the
    /// incremental up-to-date skip.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on album modify date.
    pub end_date: Option<DateTime<Utc>>,
    pub include_video: bool,
    /// Suppress per-item progress lines.
    pub quiet: bool,
}

impl ScanFilter {
    /// True when no filter narrows which albums are visited.
    pub fn is_unrestricted(&self) -> bool {
        self.album_name.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }
}

/// Album name lists consulted by the skip rules and the link projector.
#[derive(Debug, Clone)]
pub struct AlbumRules {
    pub hidden: Vec<String>,
    pub always_rescan: Vec<String>,
}

impl Default for AlbumRules {
    fn default() -> Self {
        Self {
            hidden: HIDDEN_ALBUMS.iter().map(|s| s.to_string()).collect(),
            always_rescan: ALWAYS_RESCAN_ALBUMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AlbumRules {
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.iter().any(|h| h == name)
    }

    pub fn is_always_rescan(&self, name: &str) -> bool {
        self.always_rescan.iter().any(|a| a == name)
    }
}

/// Everything an indexing pass may touch, handed over at construction.
pub struct ScanContext<'a> {
    pub catalog: &'a dyn LocalCatalog,
    pub remote: &'a dyn RemoteCatalog,
    pub filter: ScanFilter,
    pub rules: AlbumRules,
    pub retry: RetryConfig,
    /// Media root; remote-only entries are placed below `<root>/remote`.
    pub media_root: PathBuf,
    /// Only list this many albums. A capped listing counts as a
    /// restricted scan.
    pub album_limit: Option<u32>,
    pub shutdown: CancellationToken,
}

impl ScanContext<'_> {
    pub(crate) fn is_unrestricted(&self) -> bool {
        self.filter.is_unrestricted() && self.album_limit.is_none()
    }
}

/// Running totals for one album scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTotals {
    /// Sum of the item counts declared by every listed album.
    pub declared_photos: u64,
    pub remote_only_added: u64,
    pub linked_existing: u64,
    /// Remote-only entries refreshed because the remote copy changed.
    pub updated: u64,
    pub ambiguous_matches: u64,
    pub albums_scanned: u64,
    pub albums_skipped: u64,
}

/// Build the catalog entry for a remote photo with no local counterpart.
pub(crate) fn remote_media_record(
    photo: &RemotePhoto,
    media_root: &Path,
    now: DateTime<Utc>,
) -> MediaRecord {
    MediaRecord {
        id: photo.id.clone(),
        filename: clean_filename(&photo.filename),
        folder: remote_media_folder(media_root, &photo.create_date),
        mime_type: photo.mime_type.clone(),
        url: Some(photo.url.clone()),
        size_bytes: photo.size,
        create_date: photo.create_date,
        modify_date: photo.modify_date,
        sync_date: now,
        source: MediaSource::RemoteOnly,
    }
}
