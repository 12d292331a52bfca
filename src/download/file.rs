use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use crate::retry::{retry_call, RetryConfig};

/// Name of the in-progress download file inside the destination folder.
pub const TEMP_DOWNLOAD_NAME: &str = ".albumsync.tmp";

/// Temp file sitting next to the final destination.
pub fn temp_download_path(download_path: &Path) -> PathBuf {
    download_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(TEMP_DOWNLOAD_NAME)
}

/// Download `url` to `download_path` through the folder's temp file.
///
/// Each attempt starts the temp file from scratch. The temp file is renamed
/// into place only after the whole body has been written.
pub async fn download_file(
    client: &Client,
    url: &str,
    download_path: &Path,
    retry_config: &RetryConfig,
) -> Result<(), DownloadError> {
    let temp_path = temp_download_path(download_path);

    retry_call(retry_config, || async {
        let _ = fs::remove_file(&temp_path).await;
        attempt_download(client, url, download_path, &temp_path).await
    })
    .await
}

async fn attempt_download(
    client: &Client,
    url: &str,
    download_path: &Path,
    temp_path: &Path,
) -> Result<(), DownloadError> {
    let path_str = download_path.display().to_string();
    let response = client.get(url).send().await.map_err(|e| DownloadError::Http {
        source: e,
        path: path_str.clone(),
        bytes_written: 0,
    })?;

    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus {
            status: response.status().as_u16(),
            path: path_str,
        });
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Http {
            source: e,
            path: path_str.clone(),
            bytes_written,
        })?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    fs::rename(temp_path, download_path).await?;
    tracing::debug!("Wrote {} bytes to {}", bytes_written, path_str);
    Ok(())
}
