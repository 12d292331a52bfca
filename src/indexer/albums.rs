//! Album scan: pages every remote album's photos through the matcher and
//! records the outcome in the local catalog.
//!
//! Per album the indexer registers the album row, pages its photos, then
//! completes the album with the content date range and a fresh sync date.
//! The global scan watermark only moves after a scan that visited every
//! album, so an interrupted or filtered run never claims progress it did
//! not make.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::paging::AlbumPager;
use super::skip::skip_reason;
use super::{remote_media_record, ScanContext, ScanTotals};
use crate::catalog::{AlbumRecord, MediaRecord};
use crate::matcher::{MatchOutcome, Matcher};
use crate::remote::{RemoteAlbum, RemotePhoto};
use crate::retry::retry_call;

/// Content date range accumulated while an album's photos are processed.
#[derive(Debug, Clone, Copy)]
struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    fn new(initial: DateTime<Utc>) -> Self {
        Self {
            start: initial,
            end: initial,
        }
    }

    fn extend(&mut self, date: DateTime<Utc>) {
        if date < self.start {
            self.start = date;
        }
        if date > self.end {
            self.end = date;
        }
    }
}

pub struct AlbumIndexer<'a> {
    ctx: ScanContext<'a>,
    totals: ScanTotals,
    /// Latest modify date of any completed album, seeded from the stored
    /// watermark.
    latest_album_date: Option<DateTime<Utc>>,
}

impl<'a> AlbumIndexer<'a> {
    pub fn new(ctx: ScanContext<'a>) -> Self {
        Self {
            ctx,
            totals: ScanTotals::default(),
            latest_album_date: None,
        }
    }

    pub fn totals(&self) -> &ScanTotals {
        &self.totals
    }

    pub fn context(&self) -> &ScanContext<'a> {
        &self.ctx
    }

    /// Index every listed album and return the scan totals.
    pub async fn run(&mut self) -> Result<ScanTotals> {
        info!("Indexing albums ...");
        self.latest_album_date = self.ctx.catalog.get_scan_watermark().await?;

        let remote = self.ctx.remote;
        let limit = self.ctx.album_limit;
        let albums = retry_call(&self.ctx.retry, || remote.list_albums(limit))
            .await
            .context("Failed to list remote albums")?;
        info!("Album count {}", albums.len());

        for album in &albums {
            if self.ctx.shutdown.is_cancelled() {
                bail!("Album scan cancelled before album '{}'", album.name);
            }
            self.index_album(album).await?;
        }

        self.complete_scan().await?;

        let t = &self.totals;
        info!(
            "Album photos declared {}, remote-only added {}, linked to local {}, updated {}, multiple matches {}",
            t.declared_photos, t.remote_only_added, t.linked_existing, t.updated, t.ambiguous_matches
        );
        info!(
            "Albums scanned {}, skipped {}",
            t.albums_scanned, t.albums_skipped
        );
        Ok(self.totals.clone())
    }

    async fn index_album(&mut self, album: &RemoteAlbum) -> Result<()> {
        self.totals.declared_photos += album.size;

        let previous = self.ctx.catalog.get_album(&album.id).await?;
        let last_sync = previous
            .as_ref()
            .and_then(|a| a.sync_date)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        if let Some(reason) = skip_reason(album, last_sync, &self.ctx.filter, &self.ctx.rules) {
            debug!("Skipping album '{}': {:?}", album.name, reason);
            self.totals.albums_skipped += 1;
            return Ok(());
        }
        if !self.ctx.filter.quiet {
            info!(
                "  Album: {}, photos: {}, updated: {}, published: {}",
                album.name, album.size, album.modify_date, album.create_date
            );
        }

        // Register the album before linking anything to it. The derived
        // dates stay at their previous values until the album completes.
        self.ctx
            .catalog
            .put_album(&AlbumRecord {
                id: album.id.clone(),
                name: album.name.clone(),
                size: album.size,
                create_date: album.create_date,
                modify_date: album.modify_date,
                start_date: previous.as_ref().and_then(|a| a.start_date),
                end_date: previous.as_ref().and_then(|a| a.end_date),
                sync_date: previous.as_ref().and_then(|a| a.sync_date),
            })
            .await?;

        let mut range = DateRange::new(album.modify_date);
        let mut pager = AlbumPager::new();
        let remote = self.ctx.remote;
        while let Some((start_index, limit)) = pager.next_page() {
            if self.ctx.shutdown.is_cancelled() {
                bail!("Album scan cancelled inside album '{}'", album.name);
            }
            let photos = retry_call(&self.ctx.retry, || {
                remote.list_album_photos(album, start_index, limit)
            })
            .await
            .with_context(|| {
                format!(
                    "Failed to list photos {}..{} of album '{}'",
                    start_index,
                    start_index.saturating_add(limit),
                    album.name
                )
            })?;

            for photo in &photos {
                self.index_photo(album, photo, &mut range).await?;
            }
            pager.advance(photos.len());
        }

        self.complete_album(album, range).await
    }

    async fn index_photo(
        &mut self,
        album: &RemoteAlbum,
        photo: &RemotePhoto,
        range: &mut DateRange,
    ) -> Result<()> {
        if !self.ctx.filter.include_video && photo.is_video() {
            return Ok(());
        }

        let catalog = self.ctx.catalog;
        let media = remote_media_record(photo, &self.ctx.media_root, Utc::now());

        let mut refreshed = false;
        if let Some((key, existing)) = catalog.find_remote_by_id(&photo.id).await? {
            // The catalog keeps whole seconds.
            if photo.modify_date.timestamp() > existing.modify_date.timestamp() {
                if !self.ctx.filter.quiet {
                    info!("Updated {}", media.local_path().display());
                }
                catalog.upsert_media(&media).await?;
                self.totals.updated += 1;
                refreshed = true;
            } else {
                // Indexed and unchanged; only make sure this album knows it.
                catalog.put_album_link(&album.id, key).await?;
                range.extend(existing.modify_date);
                return Ok(());
            }
        }

        match Matcher::new(catalog).find(&media).await? {
            MatchOutcome::Unique(row, tier)
                if photo.modify_date.timestamp() > row.sync_date.timestamp() =>
            {
                // Edited remotely after the local copy was taken. The local
                // entry stays; the two versions diverge from here on.
                debug!(
                    "{} dates are out by {}, remote date {}, local date {}, local sync date {} ({:?})",
                    media.filename,
                    photo.modify_date - row.sync_date,
                    photo.modify_date,
                    row.modify_date,
                    row.sync_date,
                    tier
                );
                self.put_remote_only(album, &media, range, refreshed).await?;
            }
            MatchOutcome::Unique(row, tier) => {
                debug!("{} matched local {} by {:?}", media.filename, row.id, tier);
                catalog.put_album_link(&album.id, row.key).await?;
                range.extend(row.create_date);
                self.totals.linked_existing += 1;
            }
            MatchOutcome::None => {
                self.put_remote_only(album, &media, range, refreshed).await?;
            }
            MatchOutcome::Ambiguous(count) => {
                self.totals.ambiguous_matches += 1;
                warn!(
                    "{} local files match {} {} {}",
                    count, media.filename, media.modify_date, media.size_bytes
                );
            }
        }
        Ok(())
    }

    async fn put_remote_only(
        &mut self,
        album: &RemoteAlbum,
        media: &MediaRecord,
        range: &mut DateRange,
        refreshed: bool,
    ) -> Result<()> {
        let key = self.ctx.catalog.upsert_media(media).await?;
        self.ctx.catalog.put_album_link(&album.id, key).await?;
        range.extend(media.modify_date);
        if !refreshed {
            self.totals.remote_only_added += 1;
            if !self.ctx.filter.quiet {
                info!(
                    "Added {} {}",
                    self.totals.remote_only_added,
                    media.local_path().display()
                );
            }
        }
        Ok(())
    }

    async fn complete_album(&mut self, album: &RemoteAlbum, range: DateRange) -> Result<()> {
        self.ctx
            .catalog
            .put_album(&AlbumRecord {
                id: album.id.clone(),
                name: album.name.clone(),
                size: album.size,
                create_date: album.create_date,
                modify_date: album.modify_date,
                start_date: Some(range.start),
                end_date: Some(range.end),
                sync_date: Some(Utc::now()),
            })
            .await?;
        self.totals.albums_scanned += 1;
        if self
            .latest_album_date
            .map_or(true, |latest| album.modify_date > latest)
        {
            self.latest_album_date = Some(album.modify_date);
        }
        Ok(())
    }

    async fn complete_scan(&mut self) -> Result<()> {
        if !self.ctx.is_unrestricted() {
            debug!("Restricted scan, leaving the scan watermark unchanged");
            return Ok(());
        }
        if let Some(latest) = self.latest_album_date {
            self.ctx.catalog.set_scan_watermark(latest).await?;
            debug!("Scan watermark set to {}", latest);
        }
        Ok(())
    }
}
