//! Candidate generation for the pending input.
//!
//! Candidates are gathered from three sources in fixed priority order:
//! history, then the dictionary, then the symbol catalog. The first slot is
//! always an empty sentinel so a selection UI never reuses a stale entry.
//! A `(source_tag, value)` pair appears at most once in the result.

use crate::bindings::EmojiCatalog;
use crate::candidate::{Candidate, CandidateList, CandidateOrigin};
use crate::dictionary::DictionarySource;
use crate::history::HistoryStore;
use ahash::AHashSet;
use tracing::debug;

/// Borrowed view of whatever sources are currently available. A missing
/// source contributes nothing.
#[derive(Clone, Copy, Default)]
pub struct SuggestionSources<'a> {
    pub history: Option<&'a HistoryStore>,
    pub dictionary: Option<&'a dyn DictionarySource>,
    pub catalog: Option<&'a EmojiCatalog>,
}

impl<'a> SuggestionSources<'a> {
    /// No sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the input history.
    pub fn with_history(mut self, history: &'a HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Add a dictionary.
    pub fn with_dictionary(mut self, dictionary: &'a dyn DictionarySource) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Add the symbol catalog for label and symbol expansion.
    pub fn with_catalog(mut self, catalog: &'a EmojiCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

/// Ordered candidate list with `(source_tag, value)` deduplication.
struct Collector {
    out: Vec<Candidate>,
    seen: AHashSet<(Option<String>, String)>,
}

impl Collector {
    fn new() -> Self {
        let mut collector = Self {
            out: Vec::new(),
            seen: AHashSet::new(),
        };
        collector.push(Candidate::sentinel());
        collector
    }

    fn push(&mut self, candidate: Candidate) {
        let key = (candidate.source_tag.clone(), candidate.value.clone());
        if self.seen.insert(key) {
            self.out.push(candidate);
        }
    }

    fn push_label(&mut self, catalog: &EmojiCatalog, label: &str) {
        for symbol in catalog.get(label).unwrap_or_default() {
            self.push(Candidate::new(
                symbol.clone(),
                Some(label.to_string()),
                CandidateOrigin::Catalog,
            ));
        }
    }
}

/// Build the suggestion list for `pending`.
pub fn collect_suggestions(pending: &str, sources: &SuggestionSources<'_>) -> Vec<Candidate> {
    let mut collector = Collector::new();
    if pending.is_empty() {
        return collector.out;
    }

    if let Some(history) = sources.history {
        for record in history.matches(pending) {
            collector.push(Candidate::new(
                record.value,
                record.sub_key,
                CandidateOrigin::History,
            ));
        }
    }

    if let Some(dictionary) = sources.dictionary {
        for entry in dictionary.search_dictionary(pending) {
            collector.push(Candidate::new(
                entry.value,
                entry.key,
                CandidateOrigin::Dictionary,
            ));
        }
    }

    if let Some(catalog) = sources.catalog {
        for label in catalog.expansion_labels(pending) {
            collector.push_label(catalog, label);
        }
    }

    debug!(pending, candidates = collector.out.len() - 1, "suggestions updated");
    collector.out
}

/// Holds the current suggestions for a session.
#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
    candidates: CandidateList,
}

impl SuggestionEngine {
    /// Create an engine whose list shows `page_size` candidates per page.
    pub fn new(page_size: usize) -> Self {
        Self {
            candidates: CandidateList::new(page_size),
        }
    }

    /// Recompute suggestions for `pending`.
    pub fn update(&mut self, pending: &str, sources: &SuggestionSources<'_>) -> &[Candidate] {
        self.candidates
            .set_candidates(collect_suggestions(pending, sources));
        self.candidates.candidates()
    }

    /// Show every symbol under `label`, after the sentinel.
    pub fn show_catalog(&mut self, label: &str, catalog: &EmojiCatalog) -> &[Candidate] {
        let mut collector = Collector::new();
        collector.push_label(catalog, label);
        self.candidates.set_candidates(collector.out);
        self.candidates.candidates()
    }

    /// Current suggestions, sentinel first.
    pub fn candidates(&self) -> &[Candidate] {
        self.candidates.candidates()
    }

    /// Paginated view for navigation.
    pub fn list(&self) -> &CandidateList {
        &self.candidates
    }

    /// Mutable list, for cursor and page movement.
    pub fn list_mut(&mut self) -> &mut CandidateList {
        &mut self.candidates
    }

    /// Drop all suggestions, the sentinel included.
    pub fn clear(&mut self) {
        self.candidates.clear();
    }
}
