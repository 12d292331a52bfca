use chrono::{DateTime, Utc};

/// An album as listed by the remote feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAlbum {
    pub id: String,
    pub name: String,
    /// Number of items the feed claims the album holds.
    pub size: u64,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
}

/// A photo or video entry from an album or the flat listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePhoto {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    /// Content URL used by the downloader.
    pub url: String,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
}

impl RemotePhoto {
    pub fn is_video(&self) -> bool {
        crate::catalog::types::is_video_mime(&self.mime_type)
    }
}
