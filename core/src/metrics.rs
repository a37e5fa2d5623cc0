//! Visual weight of memo text and line-wrap simulation.
//!
//! The memo widget renders a fixed-pitch font in which "half-width" glyphs
//! (ASCII, half-width kana, a few narrow brackets) take half the advance of
//! everything else. Widths are therefore measured in weight units: `0.5` for a
//! half-width cluster, `1.0` for any other cluster. Line terminators weigh
//! nothing.

use crate::grapheme::is_line_break;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Weight of a half-width cluster.
pub const HALF_WIDTH: f64 = 0.5;
/// Weight of every other visible cluster.
pub const FULL_WIDTH: f64 = 1.0;

/// Narrow punctuation outside the ASCII and half-width kana blocks.
const NARROW_BRACKETS: [char; 6] = ['\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2039}', '\u{203A}'];

/// Inline presentation tags such as `<b>`, `</color>` or `<size=20>`.
static FORMAT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][^<>\n]*>").expect("inline tag pattern is valid")
});

/// Result of [`cut_to_width`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutResult<'a> {
    /// Longest prefix whose weight does not exceed the limit.
    pub text: &'a str,
    /// True when the whole input fit.
    pub fully_fit: bool,
    /// Weight of `text`.
    pub weight: f64,
}

fn is_half_width_char(ch: char) -> bool {
    ch.is_ascii() || ('\u{FF61}'..='\u{FF9F}').contains(&ch) || NARROW_BRACKETS.contains(&ch)
}

/// Weight of one grapheme cluster; the base scalar decides.
pub fn cluster_weight(cluster: &str) -> f64 {
    if is_line_break(cluster) {
        return 0.0;
    }
    match cluster.chars().next() {
        Some(ch) if is_half_width_char(ch) => HALF_WIDTH,
        Some(_) => FULL_WIDTH,
        None => 0.0,
    }
}

/// Sum of cluster weights over `text`, ignoring CR/LF.
pub fn weighted_length(text: &str) -> f64 {
    text.graphemes(true).map(cluster_weight).sum()
}

/// Like [`weighted_length`], but inline formatting tags weigh nothing.
pub fn visible_weight(text: &str) -> f64 {
    let mut total = 0.0;
    for_each_segment(text, |segment, is_tag| {
        if !is_tag {
            total += weighted_length(segment);
        }
    });
    total
}

/// Cut `text` at the first cluster that would push the weight strictly above
/// `max_weight`.
pub fn cut_to_width(text: &str, max_weight: f64) -> CutResult<'_> {
    let mut weight = 0.0;
    for (idx, cluster) in text.grapheme_indices(true) {
        let w = cluster_weight(cluster);
        if weight + w > max_weight {
            return CutResult {
                text: &text[..idx],
                fully_fit: false,
                weight,
            };
        }
        weight += w;
    }
    CutResult {
        text,
        fully_fit: true,
        weight,
    }
}

/// Insert `\n` wherever a line would exceed `max_weight_per_line`.
///
/// Existing breaks reset the line counter. Inline formatting tags are copied
/// verbatim, never split and never counted. A break is never inserted at the
/// start of a line, so a single cluster wider than the limit stays on its own
/// line.
pub fn insert_line_breaks(text: &str, max_weight_per_line: f64) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut line_weight = 0.0;

    for_each_segment(text, |segment, is_tag| {
        if is_tag {
            out.push_str(segment);
            return;
        }
        for cluster in segment.graphemes(true) {
            if is_line_break(cluster) {
                out.push_str(cluster);
                line_weight = 0.0;
                continue;
            }
            let w = cluster_weight(cluster);
            if line_weight > 0.0 && line_weight + w > max_weight_per_line {
                out.push('\n');
                line_weight = 0.0;
            }
            out.push_str(cluster);
            line_weight += w;
        }
    });

    out
}

/// Number of lines `text` occupies once wrapped. A trailing break does not
/// open a new counted line.
pub fn line_count(text: &str, max_weight_per_line: f64) -> usize {
    let wrapped = insert_line_breaks(text, max_weight_per_line);
    let lines = wrapped.split('\n').count();
    if wrapped.ends_with('\n') {
        lines - 1
    } else {
        lines
    }
}

pub fn fits_within_lines(text: &str, max_lines: usize, max_weight_per_line: f64) -> bool {
    line_count(text, max_weight_per_line) <= max_lines
}

/// Walk `text` as alternating plain and tag segments.
fn for_each_segment<'a>(text: &'a str, mut f: impl FnMut(&'a str, bool)) {
    let mut last = 0;
    for tag in FORMAT_TAG.find_iter(text) {
        if tag.start() > last {
            f(&text[last..tag.start()], false);
        }
        f(tag.as_str(), true);
        last = tag.end();
    }
    if last < text.len() {
        f(&text[last..], false);
    }
}
