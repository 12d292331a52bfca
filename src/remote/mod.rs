//! Remote photo catalog: paginated album and photo listings.
//!
//! [`RemoteCatalog`] is the seam the album indexer pages through;
//! [`FeedClient`] is the HTTP implementation over the JSON photo feed.
//! Retrying is the caller's job (see [`crate::retry::retry_call`]) so every
//! call site applies the same bounded policy.

pub mod error;
pub mod feed;
pub mod types;

pub use error::RemoteError;
pub use feed::FeedClient;
pub use types::{RemoteAlbum, RemotePhoto};

use async_trait::async_trait;

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// List the user's albums, optionally only the first `limit`.
    async fn list_albums(&self, limit: Option<u32>) -> Result<Vec<RemoteAlbum>, RemoteError>;

    /// One page of an album's photos. `start_index` is 1-based.
    async fn list_album_photos(
        &self,
        album: &RemoteAlbum,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError>;

    /// One page of the flat, album-independent photo listing.
    async fn list_all_photos(
        &self,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError>;
}
