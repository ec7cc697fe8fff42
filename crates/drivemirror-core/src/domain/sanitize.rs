//! Local file-name sanitization
//!
//! Remote names may contain characters that are illegal on common local
//! filesystems, or be long enough to exceed path-component limits.
//! [`sanitize_name`] maps any string to a safe, non-empty segment.

/// Maximum length of a sanitized name, in characters
pub const MAX_NAME_LEN: usize = 240;

/// Maximum number of extension characters kept when truncating
pub const MAX_EXT_LEN: usize = 20;

/// Replacement used for empty or reserved names
pub const FALLBACK_NAME: &str = "untitled";

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

/// Converts a remote name into a filesystem-safe segment
///
/// Illegal characters become `_`, surrounding whitespace is trimmed, and
/// names longer than [`MAX_NAME_LEN`] characters are truncated while keeping
/// (a prefix of) the extension.
///
/// # Returns
/// A non-empty string of at most [`MAX_NAME_LEN`] characters containing none
/// of `< > : " / \ | ? *` or NUL. Never `.` or `..`.
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let replaced: String = name
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();

    let result = if trimmed.chars().count() > MAX_NAME_LEN {
        truncate_keeping_extension(trimmed)
    } else {
        trimmed.to_string()
    };

    if result.is_empty() || result == "." || result == ".." {
        FALLBACK_NAME.to_string()
    } else {
        result
    }
}

fn truncate_keeping_extension(name: &str) -> String {
    // Extension starts at the last '.' unless that dot is the first character
    let (base, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    let ext: String = ext.chars().take(MAX_EXT_LEN).collect();
    let ext_len = ext.chars().count();
    let base: String = base.chars().take(MAX_NAME_LEN - ext_len).collect();

    // Truncation can expose trailing whitespace in the base
    format!("{}{}", base.trim_end(), ext)
}
