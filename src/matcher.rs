//! Decides whether a remote photo already exists as a local file.
//!
//! Lookups run in tiers and the first tier that narrows the local catalog to
//! a single entry wins:
//!
//! 1. byte size alone
//! 2. filename alone
//! 3. filename and size, only when the filename alone was ambiguous
//! 4. filename and modify date, allowing for camera clock skew
//!
//! Tier 3 treats several rows with the same name and size as one logical
//! image and takes the first by catalog key. That is a policy choice, not a
//! guarantee that the rows are the same file.
//!
//! The matcher only reads from the catalog.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::catalog::{CatalogError, LocalCatalog, MatchRow, MediaRecord};

/// Clock skew offsets, in hours, tried after the exact timestamp misses.
/// Together with the exact check this covers the inclusive range [-1h, 0h].
const CLOCK_SKEW_OFFSETS_HOURS: [i64; 1] = [-1];

/// Which lookup produced a unique match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Size,
    Filename,
    FilenameAndSize,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one local entry corresponds to the remote photo.
    Unique(MatchRow, MatchTier),
    /// Nothing local corresponds to the remote photo.
    None,
    /// Several local entries share the photo's name and timestamp.
    Ambiguous(usize),
}

pub struct Matcher<'a> {
    catalog: &'a dyn LocalCatalog,
}

impl<'a> Matcher<'a> {
    pub fn new(catalog: &'a dyn LocalCatalog) -> Self {
        Self { catalog }
    }

    pub async fn find(&self, media: &MediaRecord) -> Result<MatchOutcome, CatalogError> {
        let by_size = self.catalog.find_by_size(media.size_bytes).await?;
        if let [row] = by_size.as_slice() {
            return Ok(MatchOutcome::Unique(row.clone(), MatchTier::Size));
        }

        let by_name = self.catalog.find_by_filename(&media.filename).await?;
        if let [row] = by_name.as_slice() {
            return Ok(MatchOutcome::Unique(row.clone(), MatchTier::Filename));
        }

        if by_name.len() > 1 {
            let by_name_and_size = self
                .catalog
                .find_by_filename_and_size(&media.filename, media.size_bytes)
                .await?;
            if let Some(first) = by_name_and_size.into_iter().next() {
                return Ok(MatchOutcome::Unique(first, MatchTier::FilenameAndSize));
            }
        }

        match self.match_by_date(&media.filename, media.modify_date).await? {
            Some(mut rows) if rows.len() == 1 => {
                info!(
                    "Matched by date on {} {}",
                    media.filename, media.modify_date
                );
                Ok(MatchOutcome::Unique(rows.remove(0), MatchTier::Date))
            }
            Some(rows) => Ok(MatchOutcome::Ambiguous(rows.len())),
            // Shared names alone say nothing about this photo.
            None => Ok(MatchOutcome::None),
        }
    }

    /// Filename plus modify date, exact first and then each skew offset.
    /// The first timestamp that finds any rows decides the result.
    async fn match_by_date(
        &self,
        filename: &str,
        modify_date: DateTime<Utc>,
    ) -> Result<Option<Vec<MatchRow>>, CatalogError> {
        let exact = self
            .catalog
            .find_by_filename_and_date(filename, modify_date, false)
            .await?;
        if !exact.is_empty() {
            return Ok(Some(exact));
        }

        for hours in CLOCK_SKEW_OFFSETS_HOURS {
            let shifted = modify_date + Duration::hours(hours);
            let rows = self
                .catalog
                .find_by_filename_and_date(filename, shifted, false)
                .await?;
            if !rows.is_empty() {
                debug!("{} matched with {}h clock skew", filename, hours);
                return Ok(Some(rows));
            }
        }

        Ok(None)
    }
}
