//! UTF-8–safe string truncation utilities.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character.
//! These helpers find the nearest char boundary so truncation is always safe.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// Returns the longest prefix of `s` whose byte length is ≤ `max_bytes`
/// and that does not split a multi-byte character.
///
/// # Examples
///
/// ```
/// use substrate_core::text::truncate_str;
///
/// assert_eq!(truncate_str("hello", 3), "hel");
/// // Em dash '—' (3 bytes) at boundary snaps back:
/// assert_eq!(truncate_str("ab—cd", 3), "ab");
/// assert_eq!(truncate_str("ab—cd", 5), "ab—");
/// ```
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // `floor_char_boundary` is nightly-only, so implement it ourselves.
    let mut end = max_bytes;
    // Walk backward to find a char boundary.
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` and append a suffix (e.g. `"..."`) if the original exceeds `max_bytes`.
///
/// The returned string is at most `max_bytes` bytes long (including the suffix).
/// If the string fits, it is returned as-is with no allocation.
///
/// # Examples
///
/// ```
/// use substrate_core::text::truncate_with_suffix;
///
/// assert_eq!(truncate_with_suffix("hello", 10, "..."), "hello".to_string());
/// assert_eq!(truncate_with_suffix("hello world", 8, "..."), "hello...");
/// ```
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let body_budget = max_bytes.saturating_sub(suffix.len());
    let prefix = truncate_str(s, body_budget);
    format!("{prefix}{suffix}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
