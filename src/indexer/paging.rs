//! Page arithmetic for the remote photo listings.
//!
//! The album listing and the flat listing stop on different signals. Album
//! pages stop on a short page; flat pages stop once a page holds fewer than
//! [`ALL_PHOTOS_STOP_THRESHOLD`] items. The two rules disagree near the
//! threshold and are kept apart on purpose.

use tracing::warn;

/// Photos requested per page.
pub(crate) const BLOCK_SIZE: u32 = 1000;

/// The feed errors out past this many items in one album.
pub(crate) const ALBUM_MAX: u32 = 10_000;

/// A flat-listing page smaller than this ends the pass.
pub(crate) const ALL_PHOTOS_STOP_THRESHOLD: usize = 48;

/// Walks one album's photos in fixed blocks up to the album-wide cap.
#[derive(Debug)]
pub(crate) struct AlbumPager {
    block: u32,
    cap: u32,
    start: u32,
    limit: u32,
    done: bool,
}

impl AlbumPager {
    pub(crate) fn new() -> Self {
        Self::with_sizes(BLOCK_SIZE, ALBUM_MAX)
    }

    pub(crate) fn with_sizes(block: u32, cap: u32) -> Self {
        Self {
            block,
            cap,
            start: 1,
            limit: block,
            done: block == 0,
        }
    }

    /// The next `(start_index, limit)` to request, or `None` when finished.
    pub(crate) fn next_page(&self) -> Option<(u32, u32)> {
        (!self.done).then_some((self.start, self.limit))
    }

    /// Record how many items the last requested page returned.
    pub(crate) fn advance(&mut self, returned: usize) {
        let requested = self.limit;
        self.start = self.start.saturating_add(self.block);
        if self.start.saturating_add(self.block) > self.cap {
            self.limit = self.cap.saturating_sub(self.start);
            if self.limit > 0 && returned >= requested as usize {
                warn!(
                    "Album listing capped at {} entries, requesting {} from index {}",
                    self.cap, self.limit, self.start
                );
            }
        }
        if self.limit == 0 || returned < requested as usize {
            self.done = true;
        }
    }
}

/// Walks the flat photo listing, advancing by the items actually returned.
#[derive(Debug)]
pub(crate) struct FlatPager {
    start: u32,
    done: bool,
}

impl FlatPager {
    pub(crate) fn new() -> Self {
        Self {
            start: 1,
            done: false,
        }
    }

    pub(crate) fn next_page(&self) -> Option<(u32, u32)> {
        (!self.done).then_some((self.start, BLOCK_SIZE))
    }

    pub(crate) fn advance(&mut self, returned: usize) {
        self.start = self
            .start
            .saturating_add(u32::try_from(returned).unwrap_or(u32::MAX));
        if returned < ALL_PHOTOS_STOP_THRESHOLD {
            self.done = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_album(pager: &mut AlbumPager, total: u32) -> Vec<(u32, u32)> {
        let mut pages = Vec::new();
        while let Some((start, limit)) = pager.next_page() {
            pages.push((start, limit));
            let available = total.saturating_sub(start - 1);
            pager.advance(available.min(limit) as usize);
        }
        pages
    }

    #[test]
    fn test_short_album_single_page() {
        let mut pager = AlbumPager::new();
        assert_eq!(drain_album(&mut pager, 2), vec![(1, 1000)]);
    }

    #[test]
    fn test_exact_block_needs_one_more_page() {
        let mut pager = AlbumPager::new();
        assert_eq!(drain_album(&mut pager, 1000), vec![(1, 1000), (1001, 1000)]);
    }

    #[test]
    fn test_empty_page_stops() {
        let mut pager = AlbumPager::new();
        pager.advance(0);
        assert_eq!(pager.next_page(), None);
    }

    #[test]
    fn test_cap_clamps_final_page_and_stops() {
        let mut pager = AlbumPager::new();
        let pages = drain_album(&mut pager, 50_000);
        assert_eq!(pages.len(), 10);
        assert_eq!(pages[8], (8001, 1000));
        assert_eq!(pages[9], (9001, 999));
        assert_eq!(pager.next_page(), None);
    }

    #[test]
    fn test_cap_with_small_sizes() {
        let mut pager = AlbumPager::with_sizes(10, 35);
        let pages = drain_album(&mut pager, 1000);
        assert_eq!(pages, vec![(1, 10), (11, 10), (21, 10), (31, 4)]);
    }

    #[test]
    fn test_cap_reached_exactly_stops_without_negative_limit() {
        let mut pager = AlbumPager::with_sizes(10, 31);
        let pages = drain_album(&mut pager, 1000);
        assert_eq!(pages, vec![(1, 10), (11, 10), (21, 10)]);
        assert_eq!(pager.next_page(), None);
    }

    #[test]
    fn test_flat_pager_advances_by_returned_count() {
        let mut pager = FlatPager::new();
        assert_eq!(pager.next_page(), Some((1, BLOCK_SIZE)));
        pager.advance(500);
        assert_eq!(pager.next_page(), Some((501, BLOCK_SIZE)));
        pager.advance(48);
        assert_eq!(pager.next_page(), Some((549, BLOCK_SIZE)));
        pager.advance(47);
        assert_eq!(pager.next_page(), None);
    }
}
