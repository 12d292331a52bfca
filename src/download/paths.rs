use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Folder under the media root that holds remote-only downloads.
pub const REMOTE_MEDIA_FOLDER: &str = "remote";

/// Layout of remote-only downloads below [`REMOTE_MEDIA_FOLDER`].
const REMOTE_FOLDER_STRUCTURE: &str = "%Y/%m";

/// Folder a remote-only item is stored in: `<root>/remote/<YYYY>/<MM>`.
pub fn remote_media_folder(root: &Path, date: &DateTime<Utc>) -> PathBuf {
    let mut path = root.join(REMOTE_MEDIA_FOLDER);
    for component in expand_date_format(REMOTE_FOLDER_STRUCTURE, date).split('/') {
        if !component.is_empty() {
            path.push(component);
        }
    }
    path
}

/// Album view folder for an album: `<links_root>/<YYYY>/<MMDD> <album name>`.
pub fn album_link_folder(links_root: &Path, end_date: &DateTime<Utc>, album_name: &str) -> PathBuf {
    let year = expand_date_format("%Y", end_date);
    let month_day = expand_date_format("%m%d", end_date);
    links_root
        .join(year)
        .join(format!("{} {}", month_day, clean_filename(album_name)))
}

/// Expand date format tokens (%Y, %m, %d, %H, %M, %S) in a single pass.
fn expand_date_format(format_str: &str, date: &DateTime<Utc>) -> String {
    let mut result = String::with_capacity(format_str.len() + 8);
    let mut chars = format_str.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('Y') => {
                    chars.next();
                    let _ = write!(result, "{:04}", date.year());
                }
                Some('m') => {
                    chars.next();
                    let _ = write!(result, "{:02}", date.month());
                }
                Some('d') => {
                    chars.next();
                    let _ = write!(result, "{:02}", date.day());
                }
                Some('H') => {
                    chars.next();
                    let _ = write!(result, "{:02}", date.hour());
                }
                Some('M') => {
                    chars.next();
                    let _ = write!(result, "{:02}", date.minute());
                }
                Some('S') => {
                    chars.next();
                    let _ = write!(result, "{:02}", date.second());
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Clean a filename by removing characters that are invalid on common
/// filesystems: `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|`.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect()
}

/// Lowercase file extensions mapped to the MIME type recorded for them.
const EXTENSION_MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("dng", "image/x-adobe-dng"),
    ("cr2", "image/x-canon-cr2"),
    ("nef", "image/x-nikon-nef"),
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("3gp", "video/3gpp"),
    ("mpg", "video/mpeg"),
    ("mts", "video/mp2t"),
];

/// Guess a MIME type from a filename's extension.
pub fn mime_type_for(filename: &str) -> &'static str {
    let ext = match filename.rfind('.') {
        Some(dot) => filename[dot + 1..].to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    EXTENSION_MIME_TYPES
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}
