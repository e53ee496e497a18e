// src/normalize.rs

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Upper-case, accent-free form of `text` for substring matching.
///
/// Upper-casing happens before decomposition because a few characters
/// only gain a combining mark once upper-cased.
pub fn normalize(text: &str) -> String {
    text.to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Same as [`normalize`] for optional fields; `None` yields an empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
