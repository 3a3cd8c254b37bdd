//! Helpers for putting conversation text into log lines.

/// One-line preview of `text`: whitespace runs collapse to a single space and
/// the result is cut to `max_chars` characters with a trailing `...`.
///
/// Counts characters, not bytes, so Cyrillic text never splits a code point.
pub fn log_preview(text: &str, max_chars: usize) -> String {
    let mut preview = String::new();
    for (count, word) in text.split_whitespace().enumerate() {
        if count > 0 {
            preview.push(' ');
        }
        preview.push_str(word);
    }

    match preview.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", preview[..cut].trim_end()),
        None => preview,
    }
}
