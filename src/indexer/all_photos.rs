//! Flat pass over the album-independent photo listing.
//!
//! Every photo id not yet indexed as remote-only is recorded, with no
//! matching against local files and no album links.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use super::paging::FlatPager;
use super::{remote_media_record, ScanContext};
use crate::retry::retry_call;

/// Index the flat photo listing. Returns the number of new entries.
pub async fn index_all_photos(ctx: &ScanContext<'_>) -> Result<u64> {
    info!("Indexing all remote photos ...");
    let remote = ctx.remote;
    let mut pager = FlatPager::new();
    let mut added = 0u64;

    while let Some((start_index, limit)) = pager.next_page() {
        if ctx.shutdown.is_cancelled() {
            bail!("Photo indexing cancelled at index {}", start_index);
        }
        let photos = retry_call(&ctx.retry, || remote.list_all_photos(start_index, limit))
            .await
            .with_context(|| format!("Failed to list photos from index {}", start_index))?;
        debug!("Indexing {} photos from index {}", photos.len(), start_index);

        for photo in &photos {
            if !ctx.filter.include_video && photo.is_video() {
                continue;
            }
            if ctx.catalog.find_remote_by_id(&photo.id).await?.is_some() {
                continue;
            }
            let media = remote_media_record(photo, &ctx.media_root, Utc::now());
            ctx.catalog.upsert_media(&media).await?;
            added += 1;
            if !ctx.filter.quiet {
                info!("Added {} {}", added, media.local_path().display());
            }
        }
        pager.advance(photos.len());
    }

    info!("Indexed {} new remote photos", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use tokio_util::sync::CancellationToken;

    use crate::catalog::db::tests::date;
    use crate::catalog::{LocalCatalog, SqliteCatalog};
    use crate::indexer::fake::{remote_photo, FakeRemote};
    use crate::indexer::{AlbumRules, ScanFilter};
    use crate::retry::RetryConfig;

    fn context<'a>(db: &'a SqliteCatalog, remote: &'a FakeRemote) -> ScanContext<'a> {
        ScanContext {
            catalog: db,
            remote,
            filter: ScanFilter {
                quiet: true,
                ..Default::default()
            },
            rules: AlbumRules::default(),
            retry: RetryConfig {
                max_retries: 3,
                base_delay_secs: 0,
                max_delay_secs: 0,
            },
            media_root: PathBuf::from("/media"),
            album_limit: None,
            shutdown: CancellationToken::new(),
        }
    }

    fn photos(count: usize) -> Vec<crate::remote::RemotePhoto> {
        (0..count)
            .map(|i| remote_photo(&format!("P{i}"), &format!("{i}.jpg"), 10, date(2018, 1, 1, 0)))
            .collect()
    }

    #[tokio::test]
    async fn test_indexes_new_photos_once() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let remote = FakeRemote::new().with_loose_photos(photos(5));

        assert_eq!(index_all_photos(&context(&db, &remote)).await.unwrap(), 5);
        assert_eq!(index_all_photos(&context(&db, &remote)).await.unwrap(), 0);
        assert_eq!(db.get_summary().await.unwrap().remote_media, 5);
        assert!(db.get_album_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stops_below_threshold_not_on_short_page() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        // A short but above-threshold page is followed by one more request.
        let remote = FakeRemote::new().with_loose_photos(photos(1060));
        assert_eq!(
            index_all_photos(&context(&db, &remote)).await.unwrap(),
            1060
        );
    }

    #[tokio::test]
    async fn test_skips_videos_by_default() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut all = photos(2);
        all[1].mime_type = "video/mp4".into();
        let remote = FakeRemote::new().with_loose_photos(all);
        assert_eq!(index_all_photos(&context(&db, &remote)).await.unwrap(), 1);
    }
}
