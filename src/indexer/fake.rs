//! In-memory remote catalog for indexer tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::remote::{RemoteAlbum, RemoteCatalog, RemoteError, RemotePhoto};

#[derive(Default)]
pub(crate) struct FakeRemote {
    albums: Vec<RemoteAlbum>,
    photos: HashMap<String, Vec<RemotePhoto>>,
    all_photos: Vec<RemotePhoto>,
    /// Calls that fail with a retryable 503 before the listing succeeds.
    transient_failures: AtomicU32,
    /// `(album id, start_index, limit)` for every photo page requested.
    pub(crate) page_requests: Mutex<Vec<(String, u32, u32)>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_album(mut self, album: RemoteAlbum, photos: Vec<RemotePhoto>) -> Self {
        self.all_photos.extend(photos.iter().cloned());
        self.photos.insert(album.id.clone(), photos);
        self.albums.push(album);
        self
    }

    pub(crate) fn with_loose_photos(mut self, photos: Vec<RemotePhoto>) -> Self {
        self.all_photos.extend(photos);
        self
    }

    pub(crate) fn failing_first(self, calls: u32) -> Self {
        self.transient_failures.store(calls, Ordering::SeqCst);
        self
    }

    pub(crate) fn album_mut(&mut self, id: &str) -> Option<&mut RemoteAlbum> {
        self.albums.iter_mut().find(|a| a.id == id)
    }

    pub(crate) fn photos_mut(&mut self, album_id: &str) -> Option<&mut Vec<RemotePhoto>> {
        self.photos.get_mut(album_id)
    }

    pub(crate) fn requests(&self) -> Vec<(String, u32, u32)> {
        self.page_requests.lock().unwrap().clone()
    }

    fn maybe_fail(&self) -> Result<(), RemoteError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RemoteError::HttpStatus {
                status: 503,
                url: "fake://feed".into(),
            });
        }
        Ok(())
    }
}

fn page(items: &[RemotePhoto], start_index: u32, limit: u32) -> Vec<RemotePhoto> {
    items
        .iter()
        .skip(start_index.saturating_sub(1) as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl RemoteCatalog for FakeRemote {
    async fn list_albums(&self, limit: Option<u32>) -> Result<Vec<RemoteAlbum>, RemoteError> {
        self.maybe_fail()?;
        let take = limit.map_or(self.albums.len(), |l| l as usize);
        Ok(self.albums.iter().take(take).cloned().collect())
    }

    async fn list_album_photos(
        &self,
        album: &RemoteAlbum,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError> {
        self.maybe_fail()?;
        self.page_requests
            .lock()
            .unwrap()
            .push((album.id.clone(), start_index, limit));
        let items = self.photos.get(&album.id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(page(items, start_index, limit))
    }

    async fn list_all_photos(
        &self,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError> {
        self.maybe_fail()?;
        Ok(page(&self.all_photos, start_index, limit))
    }
}

pub(crate) fn remote_album(id: &str, name: &str, size: u64, modified: DateTime<Utc>) -> RemoteAlbum {
    RemoteAlbum {
        id: id.to_string(),
        name: name.to_string(),
        size,
        create_date: modified,
        modify_date: modified,
    }
}

pub(crate) fn remote_photo(id: &str, filename: &str, size: u64, modified: DateTime<Utc>) -> RemotePhoto {
    RemotePhoto {
        id: id.to_string(),
        filename: filename.to_string(),
        size,
        mime_type: "image/jpeg".to_string(),
        url: format!("https://photos.test/{id}"),
        create_date: modified,
        modify_date: modified,
    }
}
