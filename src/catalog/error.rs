//! Error types for the local reference catalog.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Failed to open or create the database file.
    #[error("Failed to open catalog at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to apply the schema.
    #[error("Catalog migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A query failed.
    #[error("Catalog query failed: {0}")]
    Query(String),

    /// The database schema version is newer than supported.
    #[error("Catalog schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl CatalogError {
    /// Create a Query error from a rusqlite error.
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
