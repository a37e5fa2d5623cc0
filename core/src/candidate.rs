//! Suggestion candidates and the paginated list the keyboard shows them in.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Which source produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    /// The empty placeholder that always occupies the first slot.
    Sentinel,
    /// Previously committed input.
    History,
    /// A dictionary word list entry.
    Dictionary,
    /// A symbol from the emoji catalog.
    Catalog,
}

/// A suggested string plus where it came from.
///
/// `source_tag` is the history sub key, the dictionary key or the catalog
/// label. Two candidates are duplicates when both `source_tag` and `value`
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    pub source_tag: Option<String>,
    pub origin: CandidateOrigin,
}

impl Candidate {
    /// Create a candidate.
    pub fn new<V: Into<String>>(value: V, source_tag: Option<String>, origin: CandidateOrigin) -> Self {
        Self {
            value: value.into(),
            source_tag,
            origin,
        }
    }

    /// The empty first-slot placeholder. It can never be accepted.
    pub fn sentinel() -> Self {
        Self::new(String::new(), None, CandidateOrigin::Sentinel)
    }

    /// Check whether this is the placeholder.
    pub fn is_sentinel(&self) -> bool {
        self.origin == CandidateOrigin::Sentinel
    }

    /// Identity used for deduplication.
    pub fn dedup_key(&self) -> (Option<&str>, &str) {
        (self.source_tag.as_deref(), self.value.as_str())
    }
}

/// Candidates split into fixed-size pages with a cursor on the current page.
#[derive(Debug, Clone)]
pub struct CandidateList {
    candidates: Vec<Candidate>,
    page_size: usize,
    current_page: usize,
    /// Position within the current page.
    cursor: usize,
}

impl CandidateList {
    /// Create an empty list. A page size of 0 is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            candidates: Vec::new(),
            page_size: page_size.max(1),
            current_page: 0,
            cursor: 0,
        }
    }

    /// Number of candidates per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Change the page size, keeping the selected candidate selected.
    pub fn set_page_size(&mut self, page_size: usize) {
        let selected = self.selected_index();
        self.page_size = page_size.max(1);
        match selected {
            Some(index) => {
                self.current_page = index / self.page_size;
                self.cursor = index % self.page_size;
            }
            None => self.reset(),
        }
    }

    /// Replace the contents and go back to the first candidate.
    pub fn set_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
        self.reset();
    }

    /// All candidates, across every page.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Candidate at a global index.
    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    /// Total number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if the list has no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of pages needed to show every candidate.
    pub fn num_pages(&self) -> usize {
        self.candidates.len().div_ceil(self.page_size)
    }

    /// Zero-based index of the visible page.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Cursor position within the visible page.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn page_range(&self) -> Range<usize> {
        let start = (self.current_page * self.page_size).min(self.candidates.len());
        let end = (start + self.page_size).min(self.candidates.len());
        start..end
    }

    /// Candidates on the visible page.
    pub fn current_page_candidates(&self) -> &[Candidate] {
        &self.candidates[self.page_range()]
    }

    /// Index into [`CandidateList::candidates`] of the candidate under the
    /// cursor.
    pub fn selected_index(&self) -> Option<usize> {
        let index = self.current_page * self.page_size + self.cursor;
        (index < self.candidates.len()).then_some(index)
    }

    /// Candidate under the cursor.
    pub fn selected(&self) -> Option<&Candidate> {
        self.selected_index().and_then(|i| self.candidates.get(i))
    }

    /// Move the cursor up within the page. Returns false at the top.
    pub fn cursor_up(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Move the cursor down within the page. Returns false at the bottom.
    pub fn cursor_down(&mut self) -> bool {
        if self.cursor + 1 >= self.page_range().len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Go to the previous page. Returns false on the first page.
    pub fn page_up(&mut self) -> bool {
        if self.current_page == 0 {
            return false;
        }
        self.current_page -= 1;
        self.clamp_cursor();
        true
    }

    /// Go to the next page. Returns false on the last page.
    pub fn page_down(&mut self) -> bool {
        if self.current_page + 1 >= self.num_pages() {
            return false;
        }
        self.current_page += 1;
        self.clamp_cursor();
        true
    }

    /// Move the cursor to `page_index` on the current page and return the
    /// global index of that candidate.
    pub fn select_on_page(&mut self, page_index: usize) -> Option<usize> {
        if page_index >= self.page_range().len() {
            return None;
        }
        self.cursor = page_index;
        self.selected_index()
    }

    /// Remove all candidates.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.reset();
    }

    /// Go back to the first page and put the cursor on its first slot.
    pub fn reset(&mut self) {
        self.current_page = 0;
        self.cursor = 0;
    }

    fn clamp_cursor(&mut self) {
        let len = self.page_range().len();
        if len > 0 && self.cursor >= len {
            self.cursor = len - 1;
        }
    }
}

impl Default for CandidateList {
    fn default() -> Self {
        Self::new(5)
    }
}
