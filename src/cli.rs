use clap::{Args, Parser, Subcommand};

use crate::remote::feed::DEFAULT_FEED_URL;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "albumsync",
    about = "Index a remote photo feed against a local media catalog"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Media root: remote-only downloads and the album link tree live here
    #[arg(long, global = true, default_value = "~/albumsync")]
    pub root: String,

    /// Catalog database path (default: <root>/albumsync.db)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index albums, download remote-only media and rebuild album links
    Sync(SyncArgs),
    /// Rebuild the album link tree from the catalog only
    LinkAlbums,
    /// Register an existing local photo folder as reference entries
    ImportLocal(ImportArgs),
    /// Show catalog totals and the scan watermark
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Only index the album with this exact name
    #[arg(short = 'a', long)]
    pub album: Option<String>,

    /// Only albums modified on or after this ISO date or interval (e.g.,
    /// 2017-01-02 or 20d). Also rescans albums that are already up to date.
    #[arg(long)]
    pub start_date: Option<String>,

    /// Only albums modified on or before this ISO date or interval
    #[arg(long)]
    pub end_date: Option<String>,

    /// Index and download videos too
    #[arg(long)]
    pub include_video: bool,

    /// Suppress per-item progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Base URL of the photo feed
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// OAuth bearer token for the feed.
    /// Prefer the ALBUMSYNC_ACCESS_TOKEN environment variable; arguments are
    /// visible in process listings.
    #[arg(long, env = "ALBUMSYNC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Only list this many albums (for testing). Never advances the watermark.
    #[arg(long)]
    pub album_limit: Option<u32>,

    /// Also index the flat all-photos listing
    #[arg(long)]
    pub index_all_photos: bool,

    /// Do not download remote-only media
    #[arg(long)]
    pub skip_download: bool,

    /// Do not rebuild the album link tree
    #[arg(long)]
    pub skip_links: bool,

    /// Delete files under <root>/remote that the catalog does not know
    #[arg(long)]
    pub remove_orphans: bool,

    /// Retries per feed request after the first attempt
    #[arg(long, default_value_t = 9)]
    pub max_retries: u32,

    /// Base delay in seconds between retries
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,

    /// Disable the download progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Folder holding the existing local photo library
    pub dir: String,

    /// Suppress per-file output
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
