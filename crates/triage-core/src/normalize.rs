//! Issue text normalization for cache keys

/// Maximum key length in characters
pub const MAX_KEY_CHARS: usize = 500;

/// Canonicalize issue text into a stable cache key.
///
/// Trims, lowercases, collapses whitespace runs into a single space and caps
/// the result at [`MAX_KEY_CHARS`] characters.
pub fn normalize(issue_text: &str) -> String {
    let collapsed = collapse_whitespace(&issue_text.to_lowercase());
    match collapsed.char_indices().nth(MAX_KEY_CHARS) {
        // Cutting can leave a trailing space behind
        Some((cut, _)) => collapsed[..cut].trim_end().to_string(),
        None => collapsed,
    }
}

/// Join whitespace-separated words with single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
