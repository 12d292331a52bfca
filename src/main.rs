//! albumsync: reconcile a remote photo feed with a local media catalog.
//!
//! Remote albums are paged through a matcher that recognizes photos already
//! present in the local library. Unmatched photos become remote-only catalog
//! entries that can be downloaded, and every album is projected as a dated
//! folder of symlinks into the media store.

#![warn(clippy::all)]

mod catalog;
mod cli;
mod config;
mod download;
mod indexer;
mod links;
mod maintenance;
mod matcher;
mod remote;
pub mod retry;
mod shutdown;
mod types;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use catalog::{LocalCatalog, SqliteCatalog};
use cli::{Command, ImportArgs, SyncArgs};
use config::{Config, SyncConfig};
use download::DownloadConfig;
use indexer::{AlbumIndexer, AlbumRules, ScanContext};
use links::LinkProjector;
use remote::FeedClient;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Run the status command.
async fn run_status(config: &Config) -> anyhow::Result<()> {
    if !config.db_path.exists() {
        println!("No catalog found at {}", config.db_path.display());
        println!("Run a sync or import-local first to create it.");
        return Ok(());
    }

    let db = SqliteCatalog::open(&config.db_path)?;
    let summary = db.get_summary().await?;

    println!("Catalog: {}", db.path().display());
    println!();
    println!("Media:");
    println!("  Local reference: {}", summary.local_media);
    println!("  Remote only:     {}", summary.remote_media);
    println!();
    println!("Albums:      {}", summary.albums);
    println!("Album links: {}", summary.album_links);
    println!();
    match summary.scan_watermark {
        Some(watermark) => println!(
            "Scan watermark: {}",
            watermark.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Scan watermark: none (no complete scan yet)"),
    }
    Ok(())
}

/// Rebuild the album link tree without touching the remote feed.
async fn run_link_albums(config: &Config) -> anyhow::Result<()> {
    let db = SqliteCatalog::open(&config.db_path)?;
    let rules = AlbumRules::default();
    LinkProjector::new(&db, &config.root, &rules)
        .rebuild()
        .await?;
    Ok(())
}

async fn run_import_local(config: &Config, args: ImportArgs) -> anyhow::Result<()> {
    let db = SqliteCatalog::open(&config.db_path)?;
    let dir = PathBuf::from(&args.dir);
    let imported = maintenance::import_local(&db, &dir, args.quiet).await?;

    println!();
    println!("Import complete:");
    println!("  Files registered: {}", imported);
    Ok(())
}

async fn run_sync(config: &Config, args: SyncArgs) -> anyhow::Result<()> {
    let sync = SyncConfig::from_cli(args)?;
    tracing::debug!(?sync, "Sync configuration");
    tracing::info!(root = %config.root.display(), "Starting albumsync");

    let db = SqliteCatalog::open(&config.db_path)?;
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let feed = FeedClient::new(client.clone(), &sync.feed_url, sync.access_token.clone());
    let shutdown_token = shutdown::install_signal_handler();

    let ctx = ScanContext {
        catalog: &db,
        remote: &feed,
        filter: sync.filter.clone(),
        rules: AlbumRules::default(),
        retry: sync.feed_retry,
        media_root: config.root.clone(),
        album_limit: sync.album_limit,
        shutdown: shutdown_token.clone(),
    };
    let mut album_indexer = AlbumIndexer::new(ctx);
    if let Err(e) = album_indexer.run().await {
        let partial = album_indexer.totals();
        tracing::info!(
            "Stopped after {} albums: {} remote-only added, {} linked to local",
            partial.albums_scanned,
            partial.remote_only_added,
            partial.linked_existing
        );
        return Err(e);
    }

    if sync.index_all_photos {
        indexer::index_all_photos(album_indexer.context()).await?;
    }

    if !sync.skip_download && !shutdown_token.is_cancelled() {
        let download_config = DownloadConfig {
            start_date: sync.filter.start_date,
            end_date: sync.filter.end_date,
            retry: sync.download_retry,
            quiet: sync.filter.quiet,
            no_progress_bar: sync.no_progress_bar,
        };
        let summary = download::download_remote_media(
            &db,
            &client,
            &download_config,
            shutdown_token.clone(),
        )
        .await?;
        if summary.failed > 0 {
            tracing::warn!("{} downloads failed; they are retried on the next sync", summary.failed);
        }
    }

    if sync.remove_orphans && !shutdown_token.is_cancelled() {
        let removed = maintenance::remove_orphans(&db, &config.root).await?;
        tracing::info!("Removed {} orphaned files", removed);
    }

    if !sync.skip_links && !shutdown_token.is_cancelled() {
        let rules = AlbumRules::default();
        let projector = LinkProjector::new(&db, &config.root, &rules);
        projector.rebuild().await?;
        tracing::info!("Album links at {}", projector.links_root().display());
    }

    if shutdown_token.is_cancelled() {
        anyhow::bail!("Sync interrupted by shutdown signal");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.global.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(&cli.global);
    match cli.command {
        Command::Sync(args) => run_sync(&config, args).await,
        Command::LinkAlbums => run_link_albums(&config).await,
        Command::ImportLocal(args) => run_import_local(&config, args).await,
        Command::Status => run_status(&config).await,
    }
}
