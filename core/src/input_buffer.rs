//! Memo text buffer with IME-style composition.
//!
//! The buffer holds two strings: `confirmed`, text already committed to the
//! memo, and `pending`, provisional input that suggestions are computed for.
//! All edits happen on grapheme-cluster boundaries.
//!
//! The memo widget shows a fixed number of lines of fixed visual width (see
//! [`crate::metrics`]). An append that would not fit is rejected and leaves the
//! buffer exactly as it was.

use crate::grapheme::{is_line_break, pop_text_element};
use crate::metrics::{fits_within_lines, insert_line_breaks, visible_weight};
use tracing::trace;

/// Default number of visible memo lines.
pub const DEFAULT_MAX_LINES: usize = 3;
/// Default line width in weight units.
pub const DEFAULT_MAX_WEIGHT_PER_LINE: f64 = 20.0;

/// How much text the memo can hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLimits {
    /// Visible lines, counted after wrapping.
    pub max_lines: usize,
    /// Line width in weight units (half-width 0.5, full-width 1.0).
    pub max_weight_per_line: f64,
}

impl LineLimits {
    /// Create limits of `max_lines` lines, each `max_weight_per_line` wide.
    pub fn new(max_lines: usize, max_weight_per_line: f64) -> Self {
        Self {
            max_lines,
            max_weight_per_line,
        }
    }

    /// Check whether `text` wraps into at most `max_lines` lines.
    pub fn fits(&self, text: &str) -> bool {
        fits_within_lines(text, self.max_lines, self.max_weight_per_line)
    }
}

impl Default for LineLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_MAX_WEIGHT_PER_LINE)
    }
}

/// Snapshot of the buffer contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferState {
    pub confirmed: String,
    pub pending: String,
}

/// Memo text split into committed and pending parts.
#[derive(Debug, Clone, Default)]
pub struct TextInputBuffer {
    confirmed: String,
    pending: String,
    limits: LineLimits,
}

impl TextInputBuffer {
    /// Create an empty buffer with the given limits.
    pub fn new(limits: LineLimits) -> Self {
        Self {
            confirmed: String::new(),
            pending: String::new(),
            limits,
        }
    }

    /// Text already committed to the memo.
    pub fn confirmed(&self) -> &str {
        &self.confirmed
    }

    /// Uncommitted input that suggestions are computed for.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// True while there is uncommitted input.
    pub fn is_composing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Check if both confirmed and pending text are empty.
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.pending.is_empty()
    }

    /// `confirmed` followed by `pending`, as the memo displays it.
    pub fn full_text(&self) -> String {
        let mut full = String::with_capacity(self.confirmed.len() + self.pending.len());
        full.push_str(&self.confirmed);
        full.push_str(&self.pending);
        full
    }

    /// Copy of both strings, for comparing before and after an edit.
    pub fn state(&self) -> BufferState {
        BufferState {
            confirmed: self.confirmed.clone(),
            pending: self.pending.clone(),
        }
    }

    /// Current line limits.
    pub fn limits(&self) -> LineLimits {
        self.limits
    }

    /// Change the limits. Existing text is kept even if it no longer fits.
    pub fn set_limits(&mut self, limits: LineLimits) {
        self.limits = limits;
    }

    /// Append `text` to the pending input.
    ///
    /// If `text` would overflow the current line, a single line break is put
    /// in front of it so the whole of `text` starts on a fresh line. Returns
    /// false, leaving the buffer unchanged, when the result would not fit in
    /// `max_lines`.
    pub fn append(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        let full = self.full_text();

        if is_line_break(text) {
            let prospective = format!("{full}{text}");
            if !self.limits.fits(&prospective) {
                trace!("line break rejected at line limit");
                return false;
            }
            self.pending.push_str(text);
            return true;
        }

        let addition = self.wrap_addition(&full, text);
        let prospective = format!("{full}{addition}");
        if !self.limits.fits(&prospective) {
            trace!(text, "append rejected at line limit");
            return false;
        }

        self.pending.push_str(&addition);
        true
    }

    /// `text` as it should be appended after `full`: unchanged, or prefixed
    /// with a break when the current line has no room for its first line.
    fn wrap_addition(&self, full: &str, text: &str) -> String {
        let max = self.limits.max_weight_per_line;
        let wrapped = insert_line_breaks(full, max);
        let current_line = wrapped.rsplit('\n').next().unwrap_or("");
        let first_line = text.lines().next().unwrap_or("");

        let used = visible_weight(current_line);
        // Never open a line with a break; an empty line takes the text as is.
        if used == 0.0 || used + visible_weight(first_line) <= max {
            text.to_string()
        } else {
            format!("\n{text}")
        }
    }

    /// Replace the pending input with `text`, subject to the same limits as
    /// [`TextInputBuffer::append`]. On rejection the old pending text stays.
    pub fn replace_pending(&mut self, text: &str) -> bool {
        let previous = std::mem::take(&mut self.pending);
        if self.append(text) {
            true
        } else {
            self.pending = previous;
            false
        }
    }

    /// Remove the last cluster of `pending`, or of `confirmed` when nothing is
    /// pending. Returns false if the buffer was empty.
    pub fn backspace(&mut self) -> bool {
        if pop_text_element(&mut self.pending) {
            return true;
        }
        pop_text_element(&mut self.confirmed)
    }

    /// Fold `pending` into `confirmed` and return what was committed.
    pub fn commit(&mut self) -> String {
        let committed = std::mem::take(&mut self.pending);
        self.confirmed.push_str(&committed);
        committed
    }

    /// Drop the pending input.
    pub fn cancel(&mut self) {
        self.pending.clear();
    }

    /// Empty the whole memo.
    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> TextInputBuffer {
        TextInputBuffer::new(LineLimits::new(3, 20.0))
    }

    #[test]
    fn append_goes_to_pending() {
        let mut buf = buffer();
        assert!(!buf.is_composing());
        assert!(buf.append("ab"));
        assert!(buf.append("c"));
        assert_eq!(buf.pending(), "abc");
        assert_eq!(buf.confirmed(), "");
        assert!(buf.is_composing());
    }

    #[test]
    fn empty_append_is_rejected() {
        let mut buf = buffer();
        assert!(!buf.append(""));
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_inserts_break() {
        let mut buf = buffer();
        assert!(buf.append(&"あ".repeat(20)));
        assert!(buf.append("い"));
        assert_eq!(buf.pending(), format!("{}\nい", "あ".repeat(20)));
    }

    #[test]
    fn overflowing_word_moves_to_next_line_whole() {
        let mut buf = buffer();
        assert!(buf.append(&"あ".repeat(19)));
        assert!(buf.append("いう"));
        assert_eq!(buf.pending(), format!("{}\nいう", "あ".repeat(19)));
    }

    #[test]
    fn replaced_candidate_is_not_split() {
        let mut buf = buffer();
        assert!(buf.append(&"あ".repeat(18)));
        buf.commit();
        assert!(buf.append("ar"));
        assert!(buf.replace_pending("ありがとう"));
        assert_eq!(buf.pending(), "\nありがとう");
        assert_eq!(buf.full_text().lines().count(), 2);
    }

    #[test]
    fn half_width_text_fits_twice_as_much() {
        let mut buf = buffer();
        assert!(buf.append(&"a".repeat(40)));
        assert!(!buf.pending().contains('\n'));
        assert!(buf.append("b"));
        assert!(buf.pending().ends_with("\nb"));
    }

    #[test]
    fn long_append_on_empty_line_wraps_visually() {
        let mut buf = buffer();
        assert!(buf.append(&"あ".repeat(50)));
        assert!(!buf.pending().contains('\n'));
        assert!(!buf.append(&"あ".repeat(11)));
        assert!(buf.append(&"あ".repeat(10)));
        assert!(!buf.append("い"));
    }

    #[test]
    fn fourth_line_is_rejected_without_change() {
        let mut buf = buffer();
        assert!(buf.append(&"あ".repeat(60)));
        buf.commit();
        let before = buf.state();

        assert!(!buf.append("い"));
        assert_eq!(buf.state(), before);

        assert!(!buf.append("いう"));
        assert_eq!(buf.state(), before);
    }

    #[test]
    fn line_break_at_limit() {
        let mut buf = buffer();
        assert!(buf.append("a"));
        assert!(buf.append("\n"));
        assert!(buf.append("b"));
        assert!(buf.append("\r\n"));
        assert!(buf.append("c"));
        // A trailing break does not open a counted line...
        assert!(buf.append("\n"));
        // ...but anything after it would.
        let before = buf.state();
        assert!(!buf.append("d"));
        assert_eq!(buf.state(), before);
        assert!(!buf.append("\n"));
        assert_eq!(buf.state(), before);
    }

    #[test]
    fn tags_do_not_count_toward_width() {
        let mut buf = buffer();
        assert!(buf.append("<color=red>"));
        assert!(buf.append(&"あ".repeat(20)));
        assert!(buf.append("</color>"));
        assert!(!buf.pending().contains('\n'));
    }

    #[test]
    fn backspace_prefers_pending() {
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        let mut buf = buffer();
        buf.append("ab");
        buf.commit();
        buf.append(family);

        assert!(buf.backspace());
        assert_eq!(buf.pending(), "");
        assert_eq!(buf.confirmed(), "ab");

        assert!(buf.backspace());
        assert_eq!(buf.confirmed(), "a");
        assert!(buf.backspace());
        assert!(!buf.backspace());
        assert!(buf.is_empty());
    }

    #[test]
    fn replace_pending_is_all_or_nothing() {
        let mut buf = buffer();
        buf.append(&"あ".repeat(30));
        buf.commit();
        buf.append("ab");
        assert!(buf.replace_pending("xyz"));
        assert_eq!(buf.pending(), "xyz");

        let before = buf.state();
        assert!(!buf.replace_pending(&"い".repeat(40)));
        assert_eq!(buf.state(), before);
    }

    #[test]
    fn commit_cancel_clear() {
        let mut buf = buffer();
        buf.append("hello");
        assert_eq!(buf.commit(), "hello");
        assert_eq!(buf.commit(), "");
        buf.append(" world");
        buf.cancel();
        assert_eq!(buf.full_text(), "hello");
        buf.append("!");
        buf.clear();
        assert_eq!(buf.state(), BufferState::default());
    }
}
