use thiserror::Error;

use crate::retry::Retryable;

/// Failures talking to the remote photo feed.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("Malformed feed from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl Retryable for RemoteError {
    /// Rate limits, server errors and transport failures are transient;
    /// client errors and unparseable bodies will not fix themselves.
    fn is_retryable(&self) -> bool {
        match self {
            RemoteError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Http { .. } => true,
            RemoteError::Malformed { .. } => false,
        }
    }
}
