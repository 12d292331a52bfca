//! Catalog trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::CatalogError;
use super::schema;
use super::types::{
    path_to_db, ts_to_utc, AlbumLink, AlbumRecord, CatalogSummary, MatchRow, MediaRecord,
    MediaSource,
};

/// Operations the matcher, album indexer, downloader and link projector need
/// from the local reference catalog.
///
/// The `find_by_*` lookups only consider locally synced entries: they answer
/// "does this remote photo already exist as a local file?".
#[async_trait]
pub trait LocalCatalog: Send + Sync {
    /// Look up a remote-only entry by its remote identifier, returning its
    /// catalog key alongside the record.
    async fn find_remote_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(i64, MediaRecord)>, CatalogError>;

    async fn find_by_size(&self, size: u64) -> Result<Vec<MatchRow>, CatalogError>;

    async fn find_by_filename(&self, filename: &str) -> Result<Vec<MatchRow>, CatalogError>;

    async fn find_by_filename_and_size(
        &self,
        filename: &str,
        size: u64,
    ) -> Result<Vec<MatchRow>, CatalogError>;

    /// Match on filename plus an exact timestamp, compared against the
    /// modify date or, with `use_create_date`, the create date.
    async fn find_by_filename_and_date(
        &self,
        filename: &str,
        date: DateTime<Utc>,
        use_create_date: bool,
    ) -> Result<Vec<MatchRow>, CatalogError>;

    async fn get_album(&self, id: &str) -> Result<Option<AlbumRecord>, CatalogError>;

    async fn put_album(&self, album: &AlbumRecord) -> Result<(), CatalogError>;

    /// Every album/media link joined with its media location and album end date.
    async fn get_album_links(&self) -> Result<Vec<AlbumLink>, CatalogError>;

    /// Link a media entry to an album. Linking the same pair twice is a no-op.
    async fn put_album_link(&self, album_id: &str, media_key: i64) -> Result<(), CatalogError>;

    async fn get_scan_watermark(&self) -> Result<Option<DateTime<Utc>>, CatalogError>;

    /// Persist the scan watermark. An older date never replaces a newer one.
    async fn set_scan_watermark(&self, date: DateTime<Utc>) -> Result<(), CatalogError>;

    /// Insert a media entry or update the existing `(id, source)` row.
    /// Returns the entry's catalog key.
    async fn upsert_media(&self, record: &MediaRecord) -> Result<i64, CatalogError>;

    /// Remote-only entries whose modify date lies within the given bounds.
    async fn remote_media(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MediaRecord>, CatalogError>;

    /// Whether any entry is stored at `folder/filename`.
    async fn has_file(&self, folder: &Path, filename: &str) -> Result<bool, CatalogError>;

    async fn get_summary(&self) -> Result<CatalogSummary, CatalogError>;
}

const MATCH_COLUMNS: &str = "key, id, create_date, modify_date, sync_date";
const MEDIA_COLUMNS: &str =
    "id, source, folder, filename, mime_type, url, size_bytes, create_date, modify_date, sync_date";

/// SQLite implementation of the catalog.
pub struct SqliteCatalog {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open or create a catalog at the given path.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::Query(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path).map_err(|e| CatalogError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open an in-memory catalog (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(|e| CatalogError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, CatalogError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|e| CatalogError::Query(e.to_string()))
    }

    fn query_matches(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<MatchRow>, CatalogError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM media WHERE source = 'local' AND {filter} ORDER BY key"
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(CatalogError::query)?;
        let rows = stmt
            .query_map(params, row_to_match)
            .map_err(CatalogError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(CatalogError::query)?;
        Ok(rows)
    }

    fn count(conn: &Connection, sql: &str) -> Result<u64, CatalogError> {
        let n: i64 = conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(CatalogError::query)?;
        Ok(n as u64)
    }
}

#[async_trait]
impl LocalCatalog for SqliteCatalog {
    async fn find_remote_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(i64, MediaRecord)>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {MEDIA_COLUMNS}, key FROM media WHERE id = ?1 AND source = 'remote'"),
            [id],
            |row| Ok((row.get(10)?, row_to_media(row)?)),
        )
        .optional()
        .map_err(CatalogError::query)
    }

    async fn find_by_size(&self, size: u64) -> Result<Vec<MatchRow>, CatalogError> {
        self.query_matches("size_bytes = ?1", &[&(size as i64)])
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Vec<MatchRow>, CatalogError> {
        self.query_matches("filename = ?1", &[&filename])
    }

    async fn find_by_filename_and_size(
        &self,
        filename: &str,
        size: u64,
    ) -> Result<Vec<MatchRow>, CatalogError> {
        self.query_matches(
            "filename = ?1 AND size_bytes = ?2",
            &[&filename, &(size as i64)],
        )
    }

    async fn find_by_filename_and_date(
        &self,
        filename: &str,
        date: DateTime<Utc>,
        use_create_date: bool,
    ) -> Result<Vec<MatchRow>, CatalogError> {
        let filter = if use_create_date {
            "filename = ?1 AND create_date = ?2"
        } else {
            "filename = ?1 AND modify_date = ?2"
        };
        self.query_matches(filter, &[&filename, &date.timestamp()])
    }

    async fn get_album(&self, id: &str) -> Result<Option<AlbumRecord>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, size, create_date, modify_date, start_date, end_date, sync_date FROM albums WHERE id = ?1",
            [id],
            |row| {
                Ok(AlbumRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    create_date: ts_to_utc(row.get(3)?),
                    modify_date: ts_to_utc(row.get(4)?),
                    start_date: row.get::<_, Option<i64>>(5)?.map(ts_to_utc),
                    end_date: row.get::<_, Option<i64>>(6)?.map(ts_to_utc),
                    sync_date: row.get::<_, Option<i64>>(7)?.map(ts_to_utc),
                })
            },
        )
        .optional()
        .map_err(CatalogError::query)
    }

    async fn put_album(&self, album: &AlbumRecord) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO albums (id, name, size, create_date, modify_date, start_date, end_date, sync_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                size = excluded.size,
                create_date = excluded.create_date,
                modify_date = excluded.modify_date,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                sync_date = excluded.sync_date
            "#,
            rusqlite::params![
                &album.id,
                &album.name,
                album.size as i64,
                album.create_date.timestamp(),
                album.modify_date.timestamp(),
                album.start_date.map(|d| d.timestamp()),
                album.end_date.map(|d| d.timestamp()),
                album.sync_date.map(|d| d.timestamp()),
            ],
        )
        .map_err(CatalogError::query)?;
        Ok(())
    }

    async fn get_album_links(&self) -> Result<Vec<AlbumLink>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                r#"
                SELECT m.folder, m.filename, a.name, COALESCE(a.end_date, a.modify_date)
                FROM album_files af
                JOIN media m ON m.key = af.media_key
                JOIN albums a ON a.id = af.album_id
                ORDER BY a.name, m.filename, m.key
                "#,
            )
            .map_err(CatalogError::query)?;
        let links = stmt
            .query_map([], |row| {
                Ok(AlbumLink {
                    folder: PathBuf::from(row.get::<_, String>(0)?),
                    filename: row.get(1)?,
                    album_name: row.get(2)?,
                    end_date: ts_to_utc(row.get(3)?),
                })
            })
            .map_err(CatalogError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(CatalogError::query)?;
        Ok(links)
    }

    async fn put_album_link(&self, album_id: &str, media_key: i64) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO album_files (album_id, media_key) VALUES (?1, ?2)",
            rusqlite::params![album_id, media_key],
        )
        .map_err(CatalogError::query)?;
        Ok(())
    }

    async fn get_scan_watermark(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
        let conn = self.lock()?;
        let ts: Option<Option<i64>> = conn
            .query_row(
                "SELECT last_scan_date FROM scan_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(CatalogError::query)?;
        Ok(ts.flatten().map(ts_to_utc))
    }

    async fn set_scan_watermark(&self, date: DateTime<Utc>) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO scan_state (id, last_scan_date) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET
                last_scan_date = MAX(COALESCE(last_scan_date, excluded.last_scan_date), excluded.last_scan_date)
            "#,
            [date.timestamp()],
        )
        .map_err(CatalogError::query)?;
        Ok(())
    }

    async fn upsert_media(&self, record: &MediaRecord) -> Result<i64, CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO media (id, source, folder, filename, mime_type, url, size_bytes, create_date, modify_date, sync_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id, source) DO UPDATE SET
                folder = excluded.folder,
                filename = excluded.filename,
                mime_type = excluded.mime_type,
                url = excluded.url,
                size_bytes = excluded.size_bytes,
                create_date = excluded.create_date,
                modify_date = excluded.modify_date,
                sync_date = excluded.sync_date
            "#,
            rusqlite::params![
                &record.id,
                record.source.as_str(),
                path_to_db(&record.folder),
                &record.filename,
                &record.mime_type,
                &record.url,
                record.size_bytes as i64,
                record.create_date.timestamp(),
                record.modify_date.timestamp(),
                record.sync_date.timestamp(),
            ],
        )
        .map_err(CatalogError::query)?;

        conn.query_row(
            "SELECT key FROM media WHERE id = ?1 AND source = ?2",
            [record.id.as_str(), record.source.as_str()],
            |row| row.get(0),
        )
        .map_err(CatalogError::query)
    }

    async fn remote_media(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MediaRecord>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {MEDIA_COLUMNS} FROM media WHERE source = 'remote' \
                 AND (?1 IS NULL OR modify_date >= ?1) AND (?2 IS NULL OR modify_date <= ?2) \
                 ORDER BY modify_date, key"
            ))
            .map_err(CatalogError::query)?;
        let records = stmt
            .query_map(
                rusqlite::params![start.map(|d| d.timestamp()), end.map(|d| d.timestamp())],
                row_to_media,
            )
            .map_err(CatalogError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(CatalogError::query)?;
        Ok(records)
    }

    async fn has_file(&self, folder: &Path, filename: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM media WHERE folder = ?1 AND filename = ?2 LIMIT 1",
                [path_to_db(folder).as_str(), filename],
                |row| row.get(0),
            )
            .optional()
            .map_err(CatalogError::query)?;
        Ok(found.is_some())
    }

    async fn get_summary(&self) -> Result<CatalogSummary, CatalogError> {
        let local_media;
        let remote_media;
        let albums;
        let album_links;
        {
            let conn = self.lock()?;
            local_media = Self::count(&conn, "SELECT COUNT(*) FROM media WHERE source = 'local'")?;
            remote_media =
                Self::count(&conn, "SELECT COUNT(*) FROM media WHERE source = 'remote'")?;
            albums = Self::count(&conn, "SELECT COUNT(*) FROM albums")?;
            album_links = Self::count(&conn, "SELECT COUNT(*) FROM album_files")?;
        }
        Ok(CatalogSummary {
            local_media,
            remote_media,
            albums,
            album_links,
            scan_watermark: self.get_scan_watermark().await?,
        })
    }
}

fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        key: row.get(0)?,
        id: row.get(1)?,
        create_date: ts_to_utc(row.get(2)?),
        modify_date: ts_to_utc(row.get(3)?),
        sync_date: ts_to_utc(row.get(4)?),
    })
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRecord> {
    let source: String = row.get(1)?;
    Ok(MediaRecord {
        id: row.get(0)?,
        source: MediaSource::from_str(&source).unwrap_or(MediaSource::LocallySynced),
        folder: PathBuf::from(row.get::<_, String>(2)?),
        filename: row.get(3)?,
        mime_type: row.get(4)?,
        url: row.get(5)?,
        size_bytes: row.get::<_, i64>(6)? as u64,
        create_date: ts_to_utc(row.get(7)?),
        modify_date: ts_to_utc(row.get(8)?),
        sync_date: ts_to_utc(row.get(9)?),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub(crate) fn date(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    pub(crate) fn local_entry(id: &str, filename: &str, size: u64, modified: DateTime<Utc>) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            filename: filename.to_string(),
            folder: PathBuf::from("/library/drive"),
            mime_type: "image/jpeg".to_string(),
            url: None,
            size_bytes: size,
            create_date: modified,
            modify_date: modified,
            sync_date: modified + Duration::days(1),
            source: MediaSource::LocallySynced,
        }
    }

    fn album(id: &str, name: &str) -> AlbumRecord {
        AlbumRecord {
            id: id.to_string(),
            name: name.to_string(),
            size: 3,
            create_date: date(2019, 1, 1, 0),
            modify_date: date(2019, 2, 1, 0),
            start_date: Some(date(2019, 1, 5, 0)),
            end_date: Some(date(2019, 1, 20, 0)),
            sync_date: Some(date(2019, 3, 1, 0)),
        }
    }

    #[test]
    fn test_open_creates_db() {
        let dir = std::env::temp_dir().join("albumsync").join("catalog_open");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("catalog.db");
        let db = SqliteCatalog::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path);
    }

    #[tokio::test]
    async fn test_upsert_media_returns_stable_key() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut record = local_entry("L1", "a.jpg", 100, date(2018, 5, 1, 12));
        let key = db.upsert_media(&record).await.unwrap();
        record.size_bytes = 200;
        assert_eq!(db.upsert_media(&record).await.unwrap(), key);
        assert_eq!(db.find_by_size(200).await.unwrap().len(), 1);
        assert!(db.find_by_size(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_id_distinct_sources() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let local = local_entry("X", "a.jpg", 100, date(2018, 5, 1, 12));
        let mut remote = local.clone();
        remote.source = MediaSource::RemoteOnly;
        let k1 = db.upsert_media(&local).await.unwrap();
        let k2 = db.upsert_media(&remote).await.unwrap();
        assert_ne!(k1, k2);
        assert_eq!(db.find_remote_by_id("X").await.unwrap(), Some((k2, remote)));
    }

    #[tokio::test]
    async fn test_match_queries_ignore_remote_entries() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut remote = local_entry("R1", "a.jpg", 100, date(2018, 5, 1, 12));
        remote.source = MediaSource::RemoteOnly;
        db.upsert_media(&remote).await.unwrap();

        assert!(db.find_by_size(100).await.unwrap().is_empty());
        assert!(db.find_by_filename("a.jpg").await.unwrap().is_empty());
        assert!(db.find_remote_by_id("R1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_by_filename_and_date() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let mut record = local_entry("L1", "a.jpg", 100, date(2018, 5, 1, 12));
        record.create_date = date(2018, 4, 1, 12);
        db.upsert_media(&record).await.unwrap();

        let by_modify = db
            .find_by_filename_and_date("a.jpg", date(2018, 5, 1, 12), false)
            .await
            .unwrap();
        assert_eq!(by_modify.len(), 1);
        let by_create = db
            .find_by_filename_and_date("a.jpg", date(2018, 4, 1, 12), true)
            .await
            .unwrap();
        assert_eq!(by_create.len(), 1);
        assert!(db
            .find_by_filename_and_date("a.jpg", date(2018, 4, 1, 12), false)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_album_round_trip() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        assert!(db.get_album("A1").await.unwrap().is_none());
        let record = album("A1", "Trip");
        db.put_album(&record).await.unwrap();
        assert_eq!(db.get_album("A1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_album_links_are_unique_and_joined() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        db.put_album(&album("A1", "Trip")).await.unwrap();
        let key = db
            .upsert_media(&local_entry("L1", "a.jpg", 100, date(2018, 5, 1, 12)))
            .await
            .unwrap();

        db.put_album_link("A1", key).await.unwrap();
        db.put_album_link("A1", key).await.unwrap();

        let links = db.get_album_links().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].album_name, "Trip");
        assert_eq!(links[0].end_date, date(2019, 1, 20, 0));
        assert_eq!(links[0].target(), PathBuf::from("/library/drive/a.jpg"));
    }

    #[tokio::test]
    async fn test_link_to_unknown_album_rejected() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let key = db
            .upsert_media(&local_entry("L1", "a.jpg", 100, date(2018, 5, 1, 12)))
            .await
            .unwrap();
        assert!(db.put_album_link("missing", key).await.is_err());
    }

    #[tokio::test]
    async fn test_watermark_never_regresses() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        assert!(db.get_scan_watermark().await.unwrap().is_none());

        db.set_scan_watermark(date(2020, 1, 1, 0)).await.unwrap();
        db.set_scan_watermark(date(2019, 1, 1, 0)).await.unwrap();
        assert_eq!(
            db.get_scan_watermark().await.unwrap(),
            Some(date(2020, 1, 1, 0))
        );

        db.set_scan_watermark(date(2021, 1, 1, 0)).await.unwrap();
        assert_eq!(
            db.get_scan_watermark().await.unwrap(),
            Some(date(2021, 1, 1, 0))
        );
    }

    #[tokio::test]
    async fn test_remote_media_date_bounds() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        for (i, month) in [1u32, 6, 12].iter().enumerate() {
            let mut record = local_entry(&format!("R{i}"), "x.jpg", 10, date(2020, *month, 1, 0));
            record.source = MediaSource::RemoteOnly;
            db.upsert_media(&record).await.unwrap();
        }
        db.upsert_media(&local_entry("L", "y.jpg", 10, date(2020, 6, 1, 0)))
            .await
            .unwrap();

        assert_eq!(db.remote_media(None, None).await.unwrap().len(), 3);
        let bounded = db
            .remote_media(Some(date(2020, 2, 1, 0)), Some(date(2020, 6, 1, 0)))
            .await
            .unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].id, "R1");
    }

    #[tokio::test]
    async fn test_has_file_and_summary() {
        let db = SqliteCatalog::open_in_memory().unwrap();
        let key = db
            .upsert_media(&local_entry("L1", "a.jpg", 100, date(2018, 5, 1, 12)))
            .await
            .unwrap();
        db.put_album(&album("A1", "Trip")).await.unwrap();
        db.put_album_link("A1", key).await.unwrap();

        assert!(db
            .has_file(Path::new("/library/drive"), "a.jpg")
            .await
            .unwrap());
        assert!(!db
            .has_file(Path::new("/library/drive"), "b.jpg")
            .await
            .unwrap());

        let summary = db.get_summary().await.unwrap();
        assert_eq!(summary.local_media, 1);
        assert_eq!(summary.remote_media, 0);
        assert_eq!(summary.albums, 1);
        assert_eq!(summary.album_links, 1);
        assert!(summary.scan_watermark.is_none());
    }
}
