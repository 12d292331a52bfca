//! Local reference catalog.
//!
//! SQLite-backed store of every known media item (pre-existing local files
//! and remote-only discoveries), the remote albums, the album/media link
//! table and the incremental scan watermark. Matching and album indexing
//! only ever talk to it through the [`LocalCatalog`] trait.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{LocalCatalog, SqliteCatalog};
pub use error::CatalogError;
pub use types::{AlbumLink, AlbumRecord, CatalogSummary, MatchRow, MediaRecord, MediaSource};
