//! Format and extension derivation from a declared MIME-like token.

/// Target format used when the declared format is missing or malformed.
pub const FALLBACK_FORMAT: &str = "jpg";

/// Extension used when neither the declared format nor the file name gives one.
pub const UNKNOWN_EXTENSION: &str = "unknown";

/// Split `type/subtype[; params]` into lowercase parts. `None` unless there are exactly
/// two non-empty parts.
fn split_media_type(declared: &str) -> Option<(String, String)> {
    let essence = declared.split(';').next().unwrap_or_default().trim();
    let parts: Vec<&str> = essence.split('/').collect();
    match parts.as_slice() {
        [kind, subtype] if !kind.trim().is_empty() && !subtype.trim().is_empty() => Some((
            kind.trim().to_ascii_lowercase(),
            subtype.trim().to_ascii_lowercase(),
        )),
        _ => None,
    }
}

/// Encoding target for a photo thumbnail: the subtype of the declared format, or
/// `jpg` when the token is absent or does not split into exactly two parts.
pub fn target_format(declared: Option<&str>) -> String {
    declared
        .and_then(split_media_type)
        .map(|(_, subtype)| subtype)
        .unwrap_or_else(|| FALLBACK_FORMAT.to_string())
}

/// Extension of the primary object.
///
/// Images use their declared subtype; everything else uses the file name's extension.
pub fn file_extension(declared: Option<&str>, file_name: &str) -> String {
    if let Some((kind, subtype)) = declared.and_then(split_media_type) {
        if kind == "image" {
            return subtype;
        }
    }

    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| UNKNOWN_EXTENSION.to_string())
}
