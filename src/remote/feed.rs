//! HTTP client for the JSON photo feed.
//!
//! The feed wraps every scalar as `{"$t": value}`; numbers sometimes arrive
//! as strings. Entries missing an id are skipped with a warning rather than
//! failing the whole page.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::RemoteError;
use super::types::{RemoteAlbum, RemotePhoto};
use super::RemoteCatalog;

pub const DEFAULT_FEED_URL: &str = "https://picasaweb.google.com";
const USER_FEED_PATH: &str = "/data/feed/api/user/default";

#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    pub fn new(client: Client, base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    async fn get_entries(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let mut request = self
            .client
            .get(&url)
            .query(&[("alt", "json")])
            .query(query);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| RemoteError::Http {
            url: url.clone(),
            source: e,
        })?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        let body: Value = response.json().await.map_err(|e| RemoteError::Http {
            url: url.clone(),
            source: e,
        })?;
        feed_entries(body).map_err(|reason| RemoteError::Malformed { url, reason })
    }
}

#[async_trait]
impl RemoteCatalog for FeedClient {
    async fn list_albums(&self, limit: Option<u32>) -> Result<Vec<RemoteAlbum>, RemoteError> {
        let mut query = vec![("kind", "album".to_string())];
        if let Some(limit) = limit {
            query.push(("max-results", limit.to_string()));
        }
        let entries = self.get_entries(USER_FEED_PATH, &query).await?;
        Ok(entries.iter().filter_map(parse_album).collect())
    }

    async fn list_album_photos(
        &self,
        album: &RemoteAlbum,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError> {
        let path = format!("{}/albumid/{}", USER_FEED_PATH, album.id);
        let query = [
            ("imgmax", "d".to_string()),
            ("start-index", start_index.to_string()),
            ("max-results", limit.to_string()),
        ];
        let entries = self.get_entries(&path, &query).await?;
        Ok(entries.iter().filter_map(parse_photo).collect())
    }

    async fn list_all_photos(
        &self,
        start_index: u32,
        limit: u32,
    ) -> Result<Vec<RemotePhoto>, RemoteError> {
        let query = [
            ("kind", "photo".to_string()),
            ("imgmax", "d".to_string()),
            ("start-index", start_index.to_string()),
            ("max-results", limit.to_string()),
        ];
        let entries = self.get_entries(USER_FEED_PATH, &query).await?;
        Ok(entries.iter().filter_map(parse_photo).collect())
    }
}

/// Pull the entry list out of a feed document. A feed with no `entry`
/// key is an empty page, not an error.
fn feed_entries(mut body: Value) -> Result<Vec<Value>, String> {
    let feed = body
        .get_mut("feed")
        .ok_or_else(|| "missing 'feed' object".to_string())?;
    match feed.get_mut("entry") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(std::mem::take(entries)),
        Some(_) => Err("'entry' is not an array".to_string()),
    }
}

fn text<'a>(entry: &'a Value, key: &str) -> Option<&'a Value> {
    entry.get(key).and_then(|v| v.get("$t"))
}

fn text_str(entry: &Value, key: &str) -> Option<String> {
    match text(entry, key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_u64(entry: &Value, key: &str) -> Option<u64> {
    match text(entry, key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Feed timestamps carry milliseconds; the catalog compares whole seconds.
fn text_date(entry: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = text_str(entry, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|d| d.with_timezone(&Utc).trunc_subsecs(0))
}

pub(crate) fn parse_album(entry: &Value) -> Option<RemoteAlbum> {
    let Some(id) = text_str(entry, "gphoto$id") else {
        warn!("Skipping album entry without gphoto$id");
        return None;
    };
    let modify_date = text_date(entry, "updated").unwrap_or(DateTime::UNIX_EPOCH);
    Some(RemoteAlbum {
        name: text_str(entry, "title").unwrap_or_default(),
        size: text_u64(entry, "gphoto$numphotos").unwrap_or(0),
        create_date: text_date(entry, "published").unwrap_or(modify_date),
        modify_date,
        id,
    })
}

pub(crate) fn parse_photo(entry: &Value) -> Option<RemotePhoto> {
    let Some(id) = text_str(entry, "gphoto$id") else {
        warn!("Skipping photo entry without gphoto$id");
        return None;
    };
    let content = entry.get("content");
    let modify_date = text_date(entry, "updated").unwrap_or(DateTime::UNIX_EPOCH);
    Some(RemotePhoto {
        filename: text_str(entry, "title").unwrap_or_else(|| id.clone()),
        size: text_u64(entry, "gphoto$size").unwrap_or(0),
        mime_type: content
            .and_then(|c| c["type"].as_str())
            .unwrap_or("application/octet-stream")
            .to_string(),
        url: content
            .and_then(|c| c["src"].as_str())
            .unwrap_or_default()
            .to_string(),
        create_date: text_date(entry, "published").unwrap_or(modify_date),
        modify_date,
        id,
    })
}
