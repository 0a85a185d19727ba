//! Small helpers for logging, text cleanup, and the file system.
//!
//! - String truncation for log previews
//! - JSON error detection for cut-off listing bodies
//! - Whitespace collapsing and file-name sanitizing
//! - Cookie file loading and output directory validation

use crate::error::CrawlError;
use std::fs as stdfs;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, backing off to the nearest
/// character boundary, with a byte count indicator appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise a truncated version with
/// `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A listing body cut off mid-transfer fails with an EOF error rather than a
/// syntax or shape error; logs flag it so the two can be told apart.
///
/// # Returns
///
/// `true` if the error is an EOF error, indicating truncation.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Collapse every run of whitespace into one space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce `name` to a short, file-system-safe stem.
///
/// Keeps alphanumerics (any script), spaces, `-` and `_`, trims, and caps the
/// result at `max_chars` characters.
///
/// # Arguments
///
/// * `name` - Display name or other free text to reduce
/// * `max_chars` - Maximum number of characters in the stem
///
/// # Returns
///
/// The cleaned stem, or `"author"` if nothing survives.
pub fn safe_file_stem(name: &str, max_chars: usize) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem: String = kept.trim().chars().take(max_chars).collect();
    let stem = stem.trim_end();
    if stem.is_empty() {
        "author".to_string()
    } else {
        stem.to_string()
    }
}

/// Read a session cookie from `path`.
///
/// A missing or blank file is not an error: crawling without a cookie is a
/// valid, degraded mode.
///
/// # Returns
///
/// The trimmed cookie, or `None` when the file is missing or blank.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] for read failures other than a missing file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_cookie_file(path: &Path) -> Result<Option<String>, CrawlError> {
    match fs::read_to_string(path).await {
        Ok(raw) => {
            let cookie = raw.trim();
            if cookie.is_empty() {
                debug!("Cookie file is empty");
                Ok(None)
            } else {
                info!(bytes = cookie.len(), "Loaded session cookie from file");
                Ok(Some(cookie.to_string()))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No cookie file");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] if the directory cannot be created or is not
/// writable (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), CrawlError> {
    fs::create_dir_all(path).await?;
    // A small sync write has the simpler error surface.
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
