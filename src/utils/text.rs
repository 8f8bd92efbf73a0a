//! Text processing utilities.

/// Marker appended to truncated text.
pub const TRUNCATION_MARKER: &str = "...";

/// First `max_chars` characters of `text`, with a marker when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Whether the text contains anything other than whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
