//! Grapheme cluster ("text element") helpers.
//!
//! Symbols on the keyboard are frequently multi-codepoint sequences: ZWJ
//! families, flags built from regional indicators, keycaps, skin-tone
//! modifiers. Every length, prefix and deletion operation in the engine goes
//! through these helpers so that such a sequence always behaves as one unit.

use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into extended grapheme clusters.
pub fn text_elements(text: &str) -> Vec<&str> {
    text.graphemes(true).collect()
}

/// Number of extended grapheme clusters in `text`.
pub fn text_element_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Returns true if the first clusters of `text` are exactly the clusters of
/// `prefix`.
///
/// Comparison is cluster by cluster, so `"e\u{301}"` does not start with
/// `"e"`, and a flag does not start with one of its regional indicators.
///
/// ```
/// use softkey_core::grapheme::starts_with_text_element;
///
/// let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
/// assert!(starts_with_text_element(&format!("{family}tail"), family));
/// assert!(!starts_with_text_element("\u{1F468}\u{200D}\u{1F469}", "\u{1F468}"));
/// ```
pub fn starts_with_text_element(text: &str, prefix: &str) -> bool {
    // Cheap rejection: a cluster-wise prefix is always a byte-wise prefix.
    if !text.starts_with(prefix) {
        return false;
    }

    let mut text_clusters = text.graphemes(true);
    for expected in prefix.graphemes(true) {
        match text_clusters.next() {
            Some(actual) if actual == expected => {}
            _ => return false,
        }
    }
    true
}

/// Byte offset where the last cluster of `text` begins, or `None` if empty.
pub fn last_text_element_start(text: &str) -> Option<usize> {
    text.grapheme_indices(true).next_back().map(|(idx, _)| idx)
}

/// Remove the last cluster of `text` in place.
///
/// Returns false when `text` was already empty.
pub fn pop_text_element(text: &mut String) -> bool {
    match last_text_element_start(text) {
        Some(start) => {
            text.truncate(start);
            true
        }
        None => false,
    }
}

/// True for clusters that are pure line terminators (`\n`, `\r`, `\r\n`).
pub fn is_line_break(cluster: &str) -> bool {
    matches!(cluster, "\n" | "\r" | "\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILY: &str = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}";
    const FLAG_JP: &str = "\u{1F1EF}\u{1F1F5}";

    #[test]
    fn counts_zwj_sequence_as_one_element() {
        assert_eq!(text_element_count(FAMILY), 1);
        assert_eq!(text_element_count(&format!("a{FAMILY}b")), 3);
        assert_eq!(text_elements(FLAG_JP), vec![FLAG_JP]);
    }

    #[test]
    fn starts_with_whole_sequences() {
        assert!(starts_with_text_element(&format!("{FAMILY}tail"), FAMILY));
        assert!(starts_with_text_element(FLAG_JP, FLAG_JP));
        assert!(starts_with_text_element("anything", ""));
    }

    #[test]
    fn starts_with_rejects_partial_cluster() {
        // First regional indicator of the flag is a shared leading code unit.
        assert!(!starts_with_text_element(FLAG_JP, "\u{1F1EF}"));
        // Base letter of a combining sequence.
        assert!(!starts_with_text_element("e\u{301}x", "e"));
        // Head of a ZWJ sequence.
        assert!(!starts_with_text_element(FAMILY, "\u{1F468}"));
    }

    #[test]
    fn starts_with_rejects_longer_prefix() {
        assert!(!starts_with_text_element("ab", "abc"));
    }

    #[test]
    fn pop_removes_whole_cluster() {
        let mut s = format!("x{FAMILY}");
        assert!(pop_text_element(&mut s));
        assert_eq!(s, "x");
        assert!(pop_text_element(&mut s));
        assert_eq!(s, "");
        assert!(!pop_text_element(&mut s));
    }

    #[test]
    fn crlf_is_a_single_break() {
        let elems = text_elements("a\r\nb");
        assert_eq!(elems, vec!["a", "\r\n", "b"]);
        assert!(is_line_break(elems[1]));
        assert!(!is_line_break("a"));
    }
}
