//! Shared key composition for storage backends.
//!
//! Primary objects live at `{prefix}{timestamp}.{extension}`; derivatives insert
//! `thumbnail/` after the prefix and reuse the primary's timestamp.

use crate::{StorageError, StorageResult};
use lumen_core::config::PathConfig;
use lumen_core::{MediaCategory, ObjectKey, UploadTimestamp};

/// Segment inserted between a prefix and a derivative's file name.
pub const THUMBNAIL_SEGMENT: &str = "thumbnail/";

/// Prefix for an upload: `{root}{category path}{folder}/`.
///
/// Generic files ignore the folder and always land directly under the file path.
pub fn upload_prefix(
    paths: &PathConfig,
    category: MediaCategory,
    folder: Option<&str>,
) -> StorageResult<String> {
    let base = paths.category_prefix(category);
    if category == MediaCategory::GenericFile {
        return Ok(base);
    }
    match normalize_folder(folder)? {
        Some(folder) => Ok(format!("{}{}/", base, folder)),
        None => Ok(base),
    }
}

/// Strip surrounding slashes and reject folders that could escape their namespace.
fn normalize_folder(folder: Option<&str>) -> StorageResult<Option<String>> {
    let Some(folder) = folder.map(|f| f.trim().trim_matches('/')) else {
        return Ok(None);
    };
    if folder.is_empty() {
        return Ok(None);
    }
    if folder.split('/').any(|segment| segment.is_empty() || segment == "..")
        || folder.chars().any(|c| c == '\\' || c.is_control())
    {
        return Err(StorageError::InvalidKey(format!(
            "folder '{}' is not a valid key segment",
            folder
        )));
    }
    Ok(Some(folder.to_string()))
}

/// Key for a primary object.
pub fn primary_key(prefix: &str, timestamp: &UploadTimestamp, extension: &str) -> ObjectKey {
    ObjectKey::new(format!(
        "{}{}.{}",
        prefix,
        timestamp.key_component(),
        extension
    ))
}

/// Prefix under which derivatives of `prefix` are written.
pub fn thumbnail_prefix(prefix: &str) -> String {
    format!("{}{}", prefix, THUMBNAIL_SEGMENT)
}

/// Key for the derivative of the primary object written with the same prefix and timestamp.
pub fn derivative_key(prefix: &str, timestamp: &UploadTimestamp, extension: &str) -> ObjectKey {
    primary_key(&thumbnail_prefix(prefix), timestamp, extension)
}
