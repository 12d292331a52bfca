//! Catalog maintenance passes: registering an existing local library and
//! removing files the catalog no longer knows about.

use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::{LocalCatalog, MediaRecord, MediaSource};
use crate::download::paths::{mime_type_for, REMOTE_MEDIA_FOLDER};
use crate::links::{ALBUMS_FOLDER, BACKUP_SUFFIX};

/// Top-level folders of a media root that hold albumsync's own output.
fn is_media_root_output(name: &str) -> bool {
    name == REMOTE_MEDIA_FOLDER
        || name == ALBUMS_FOLDER
        || name
            .strip_prefix(ALBUMS_FOLDER)
            .is_some_and(|rest| rest == BACKUP_SUFFIX)
}

/// Register every regular file below `dir` as a locally synced reference
/// entry. Returns the number of files recorded.
///
/// Entry ids are the SHA-256 of the path relative to `dir`, so importing the
/// same tree again updates rows instead of adding them. Symlinks are not
/// followed, and the `remote` and `albums` folders are skipped when `dir` is
/// a media root.
pub async fn import_local(catalog: &dyn LocalCatalog, dir: &Path, quiet: bool) -> Result<u64> {
    let root = std::fs::canonicalize(dir)
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    info!("Importing local files from {} ...", root.display());

    let now = Utc::now();
    let mut imported = 0u64;
    let walker = WalkDir::new(&root).into_iter().filter_entry(|e| {
        !(e.depth() == 1
            && e.file_type().is_dir()
            && is_media_root_output(&e.file_name().to_string_lossy()))
    });
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let Some(folder) = path.parent() else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let relative = path.strip_prefix(&root).unwrap_or(path);
        let modified = metadata.modified().ok().map(to_utc).unwrap_or(now);
        let record = MediaRecord {
            id: format!("{:x}", Sha256::digest(relative.to_string_lossy().as_bytes())),
            mime_type: mime_type_for(&filename).to_string(),
            filename,
            folder: folder.to_path_buf(),
            url: None,
            size_bytes: metadata.len(),
            create_date: metadata.created().ok().map(to_utc).unwrap_or(modified),
            modify_date: modified,
            sync_date: now,
            source: MediaSource::LocallySynced,
        };
        catalog.upsert_media(&record).await?;
        imported += 1;
        if !quiet {
            info!("  Imported {}", path.display());
        } else if imported % 1000 == 0 {
            info!("Imported {} files ...", imported);
        }
    }

    info!("Imported {} local files", imported);
    Ok(imported)
}

/// Delete every file below `<media_root>/remote` that has no catalog entry.
///
/// The catalog is treated as ground truth; deletions are immediate and
/// not recoverable. A file that cannot be deleted is logged and left in
/// place. Returns the number of files removed.
pub async fn remove_orphans(catalog: &dyn LocalCatalog, media_root: &Path) -> Result<u64> {
    let top = media_root.join(REMOTE_MEDIA_FOLDER);
    info!("Finding deleted media under {} ...", top.display());

    let mut removed = 0u64;
    let mut failed = 0u64;
    for entry in WalkDir::new(&top).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let (Some(folder), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };
        if catalog.has_file(folder, &name.to_string_lossy()).await? {
            continue;
        }
        if delete_orphan(path) {
            removed += 1;
        } else {
            failed += 1;
        }
    }
    if failed > 0 {
        warn!("{} orphaned files could not be deleted", failed);
    }
    Ok(removed)
}

fn delete_orphan(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("{} deleted", path.display());
            true
        }
        Err(e) => {
            warn!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
