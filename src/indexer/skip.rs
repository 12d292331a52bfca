use chrono::{DateTime, Utc};

use super::{AlbumRules, ScanFilter};
use crate::remote::RemoteAlbum;

/// Why an album is left out of this scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NameFilter,
    Hidden,
    AfterEndDate,
    BeforeStartDate,
    UpToDate,
    Empty,
}

/// Decide whether `album` is skipped. `last_sync` is the album's persisted
/// sync date, or the minimum date for an album never seen before.
pub(crate) fn skip_reason(
    album: &RemoteAlbum,
    last_sync: DateTime<Utc>,
    filter: &ScanFilter,
    rules: &AlbumRules,
) -> Option<SkipReason> {
    if filter
        .album_name
        .as_deref()
        .is_some_and(|name| name != album.name)
    {
        return Some(SkipReason::NameFilter);
    }
    if rules.is_hidden(&album.name) {
        return Some(SkipReason::Hidden);
    }
    if filter.end_date.is_some_and(|end| end < album.modify_date) {
        return Some(SkipReason::AfterEndDate);
    }
    if filter.start_date.is_some_and(|start| start > album.modify_date) {
        return Some(SkipReason::BeforeStartDate);
    }
    // An explicit start date forces a rescan of everything in range.
    if filter.start_date.is_none()
        && album.modify_date < last_sync
        && !rules.is_always_rescan(&album.name)
    {
        return Some(SkipReason::UpToDate);
    }
    if album.size == 0 {
        return Some(SkipReason::Empty);
    }
    None
}
