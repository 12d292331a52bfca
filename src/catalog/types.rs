//! Record types stored in the local reference catalog.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

/// Where a media entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSource {
    /// A pre-existing local file, the reference the matcher compares against.
    LocallySynced,
    /// Discovered in the remote catalog with no matching local file.
    RemoteOnly,
}

impl MediaSource {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocallySynced => "local",
            Self::RemoteOnly => "remote",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::LocallySynced),
            "remote" => Some(Self::RemoteOnly),
            _ => None,
        }
    }
}

/// A single media item, local or remote-only.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    /// Stable identifier, unique within `source`.
    pub id: String,
    pub filename: String,
    /// Folder the file lives (or will live) in.
    pub folder: PathBuf,
    pub mime_type: String,
    /// Remote content URL, only set for remote-only entries.
    pub url: Option<String>,
    pub size_bytes: u64,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    /// When this entry was last synchronised into the catalog.
    pub sync_date: DateTime<Utc>,
    pub source: MediaSource,
}

impl MediaRecord {
    /// Full path of the media file on disk.
    pub fn local_path(&self) -> PathBuf {
        self.folder.join(&self.filename)
    }

    pub fn is_video(&self) -> bool {
        is_video_mime(&self.mime_type)
    }
}

pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}

/// The slice of a local entry the matcher needs to make its decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    /// Catalog key, used for album links.
    pub key: i64,
    pub id: String,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    pub sync_date: DateTime<Utc>,
}

/// A remote album plus the date range derived from its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRecord {
    pub id: String,
    pub name: String,
    /// Item count declared by the remote feed.
    pub size: u64,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    /// Earliest content date seen in the last completed scan of this album.
    pub start_date: Option<DateTime<Utc>>,
    /// Latest content date seen in the last completed scan of this album.
    pub end_date: Option<DateTime<Utc>>,
    /// Wall-clock time this album last finished processing.
    pub sync_date: Option<DateTime<Utc>>,
}

/// One row of the album/media join, as consumed by the link projector.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumLink {
    pub folder: PathBuf,
    pub filename: String,
    pub album_name: String,
    pub end_date: DateTime<Utc>,
}

impl AlbumLink {
    pub fn target(&self) -> PathBuf {
        self.folder.join(&self.filename)
    }
}

/// Totals reported by the `status` command.
#[derive(Debug, Clone, Default)]
pub struct CatalogSummary {
    pub local_media: u64,
    pub remote_media: u64,
    pub albums: u64,
    pub album_links: u64,
    pub scan_watermark: Option<DateTime<Utc>>,
}

pub(crate) fn ts_to_utc(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn path_to_db(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
