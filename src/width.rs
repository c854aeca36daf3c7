//! Terminal display width helpers.
//!
//! Provides ANSI-aware width calculation so text drawn onto a terminal
//! surface can be clipped to the visible columns.

/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);
    unicode_width::UnicodeWidthStr::width(&*clean_str)
}

/// Longest prefix of `text` whose display width fits in `max_width` columns.
pub fn truncate_to_width(text: &str, max_width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > max_width {
            return &text[..idx];
        }
        used += width;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_sequences_have_no_width() {
        assert_eq!(display_width("\x1b[31mhi\x1b[0m"), 2);
    }

    #[test]
    fn truncation_respects_wide_chars() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("ok", 10), "ok");
    }
}
