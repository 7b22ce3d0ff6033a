//! Storage primitives and small string helpers.
//!
//! This module provides helper functions used throughout the application:
//! - Log-friendly string truncation
//! - JSON and text file reading/writing with parent directory creation
//! - File system validation for output directories

use serde::Serialize;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and the number of dropped bytes appended.
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
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a scratch
/// file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, a file in the way, etc.).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let check_path = path.join("..__write_check__");
    fs::write(&check_path, b"").await?;
    let _ = fs::remove_file(&check_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Read a file and parse it as JSON.
///
/// Missing files and malformed JSON are both reported as `None`; the reason is
/// logged at `warn`.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_json_file(path: &Path) -> Option<serde_json::Value> {
    let text = load_text_file(path).await?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Malformed JSON file");
            None
        }
    }
}

/// Serialize `value` as pretty JSON, creating parent directories as needed.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn save_json_file<T: Serialize>(value: &T, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    save_text_file(&json, path).await
}

/// Read a UTF-8 text file; `None` when it is missing or unreadable.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_text_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("File not found");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not read file");
            None
        }
    }
}

/// Write text to `path`, creating parent directories as needed.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), bytes = content.len()))]
pub async fn save_text_file(content: &str, path: &Path) -> io::Result<()> {
    save_bytes_file(content.as_bytes(), path).await
}

/// Write raw bytes to `path`, creating parent directories as needed.
pub async fn save_bytes_file(content: &[u8], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}
