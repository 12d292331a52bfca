//! Album link tree: a browsable `<year>/<MMDD> <album>/<filename>` view of
//! the flat media store, built from symlinks.
//!
//! Each rebuild starts from an empty tree. The previous tree is kept at
//! `albums.previous` for one generation. Name clashes inside an album
//! folder are reported and left alone.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::catalog::{AlbumLink, LocalCatalog};
use crate::download::paths::album_link_folder;
use crate::indexer::AlbumRules;

/// Folder under the media root that holds the link tree.
pub const ALBUMS_FOLDER: &str = "albums";

pub(crate) const BACKUP_SUFFIX: &str = ".previous";

/// Outcome counts for one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub created: u64,
    /// Link already present and pointing at the same file.
    pub existing: u64,
    /// Another file already holds the link's name.
    pub clashes: u64,
    /// Links belonging to always-rescan albums, left out of the view.
    pub skipped: u64,
}

pub struct LinkProjector<'a> {
    catalog: &'a dyn LocalCatalog,
    links_root: PathBuf,
    rules: &'a AlbumRules,
}

impl<'a> LinkProjector<'a> {
    pub fn new(catalog: &'a dyn LocalCatalog, media_root: &Path, rules: &'a AlbumRules) -> Self {
        Self {
            catalog,
            links_root: media_root.join(ALBUMS_FOLDER),
            rules,
        }
    }

    pub fn links_root(&self) -> &Path {
        &self.links_root
    }

    pub fn backup_root(&self) -> PathBuf {
        let mut name = self.links_root.as_os_str().to_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Rotate the current tree to the backup and rebuild it from the
    /// catalog's album links.
    pub async fn rebuild(&self) -> Result<LinkReport> {
        info!("Creating album folder links to media ...");
        self.rotate()?;

        let links = self.catalog.get_album_links().await?;
        let mut report = LinkReport::default();
        for link in &links {
            if self.rules.is_always_rescan(&link.album_name) {
                report.skipped += 1;
                continue;
            }
            self.project(link, &mut report)?;
        }

        info!(
            "Album links done: {} created, {} existing, {} clashes",
            report.created, report.existing, report.clashes
        );
        Ok(report)
    }

    fn rotate(&self) -> Result<()> {
        if !self.links_root.exists() {
            return Ok(());
        }
        let backup = self.backup_root();
        if backup.exists() {
            std::fs::remove_dir_all(&backup)
                .with_context(|| format!("Failed to remove {}", backup.display()))?;
        }
        std::fs::rename(&self.links_root, &backup).with_context(|| {
            format!(
                "Failed to move {} to {}",
                self.links_root.display(),
                backup.display()
            )
        })?;
        debug!("Previous album links kept at {}", backup.display());
        Ok(())
    }

    fn project(&self, link: &AlbumLink, report: &mut LinkReport) -> Result<()> {
        let folder = album_link_folder(&self.links_root, &link.end_date, &link.album_name);
        let link_file = folder.join(&link.filename);
        let target = link.target();

        match std::fs::symlink_metadata(&link_file) {
            Ok(meta) if meta.file_type().is_symlink() => {
                if std::fs::read_link(&link_file).ok().as_deref() == Some(target.as_path()) {
                    report.existing += 1;
                } else {
                    report.clashes += 1;
                    warn!("Name clash on link {}", link_file.display());
                }
                return Ok(());
            }
            Ok(_) => {
                report.clashes += 1;
                warn!("Name clash on link {}", link_file.display());
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", link_file.display()))
            }
        }

        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;
        make_symlink(&target, &link_file)
            .with_context(|| format!("Failed to link {}", link_file.display()))?;
        report.created += 1;
        Ok(())
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
