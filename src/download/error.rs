use thiserror::Error;

use crate::retry::Retryable;

/// Failures fetching the bytes of a remote-only item.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error {status} downloading {path}")]
    HttpStatus { status: u16, path: String },

    #[error("HTTP error downloading {path} (bytes_so_far={bytes_written}): {source}")]
    Http {
        source: reqwest::Error,
        path: String,
        bytes_written: u64,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("No content URL recorded for {0}")]
    MissingUrl(String),
}

impl Retryable for DownloadError {
    /// Server errors, rate limits and dropped connections are transient;
    /// disk failures and missing URLs are not.
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Http { .. } => true,
            DownloadError::Disk(_) => false,
            DownloadError::MissingUrl(_) => false,
        }
    }
}
