//! Storage key generation.
//!
//! Key format: `{prefix}{YYYY}/{MM}/{DD}/{uuid}{ext}`. Uniqueness comes from a random
//! UUIDv4, never from the timestamp.

use std::path::Path;

use chrono::{DateTime, Datelike, Utc};
use photodrop_core::StorageKey;
use uuid::Uuid;

/// Normalize a configured prefix: no leading slash, exactly one trailing slash, or empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Folder holding every object uploaded on `now`'s UTC date, with trailing slash.
pub fn date_partition(prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}{:04}/{:02}/{:02}/",
        normalize_prefix(prefix),
        now.year(),
        now.month(),
        now.day()
    )
}

/// Lower-cased extension of the final path component, including the dot.
///
/// Dotfiles such as `.bashrc` have no extension; non-alphanumeric extensions are dropped.
pub fn file_extension(original_filename: &str) -> String {
    let base = original_filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_filename);
    Path::new(base)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Generate a fresh key for an upload received at `now`.
pub fn generate_storage_key(
    prefix: &str,
    original_filename: &str,
    now: DateTime<Utc>,
) -> StorageKey {
    StorageKey::new(format!(
        "{}{}{}",
        date_partition(prefix, now),
        Uuid::new_v4(),
        file_extension(original_filename)
    ))
}
