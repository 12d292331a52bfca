//! Catalog schema definitions and migrations.

use rusqlite::Connection;

use super::error::CatalogError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS media (
    key INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    source TEXT NOT NULL,
    folder TEXT NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    url TEXT,
    size_bytes INTEGER NOT NULL,
    create_date INTEGER NOT NULL,
    modify_date INTEGER NOT NULL,
    sync_date INTEGER NOT NULL,
    UNIQUE (id, source)
);

CREATE INDEX IF NOT EXISTS idx_media_size ON media(size_bytes);
CREATE INDEX IF NOT EXISTS idx_media_filename ON media(filename);
CREATE INDEX IF NOT EXISTS idx_media_location ON media(folder, filename);

CREATE TABLE IF NOT EXISTS albums (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    create_date INTEGER NOT NULL,
    modify_date INTEGER NOT NULL,
    start_date INTEGER,
    end_date INTEGER,
    sync_date INTEGER
);

CREATE TABLE IF NOT EXISTS album_files (
    album_id TEXT NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
    media_key INTEGER NOT NULL REFERENCES media(key) ON DELETE CASCADE,
    PRIMARY KEY (album_id, media_key)
);

CREATE TABLE IF NOT EXISTS scan_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_scan_date INTEGER
);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, CatalogError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), CatalogError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// Idempotent; safe to call on both new and existing catalogs.
pub(crate) fn migrate(conn: &Connection) -> Result<(), CatalogError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(CatalogError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized catalog schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}
