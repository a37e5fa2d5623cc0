//! Editing session.
//!
//! A `Session` owns every piece of engine state: the key bindings and their
//! catalog, the dictionary, the input history, the memo buffer and the current
//! suggestions. The keyboard UI drives it either through the individual
//! methods or by feeding [`KeyEvent`]s to [`Session::handle_key`].

use crate::bindings::{KeyBindingRegistry, KeyKind, SharedRegistry};
use crate::candidate::Candidate;
use crate::dictionary::{Dictionary, SharedDictionary};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::input_buffer::{BufferState, TextInputBuffer};
use crate::suggestion::{SuggestionEngine, SuggestionSources};
use crate::Config;
use tracing::{debug, info, warn};

/// Input events from the on-screen keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// Free text, e.g. from a character key or a paste.
    Text(String),
    /// A bound key, resolved through the key binding registry.
    Key { key_no: i64, kind: String },
    Backspace,
    /// Commit pending input, or insert a line break when nothing is pending.
    LineBreak,
    /// Commit pending input.
    Commit,
    /// Drop pending input.
    Cancel,
    /// Empty the whole memo.
    Clear,
    /// Accept the n-th candidate of the current page.
    Select(usize),
    /// Accept the candidate under the cursor.
    Accept,
    Up,
    Down,
    PageUp,
    PageDown,
}

/// Outcome of [`Session::handle_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResult {
    Handled,
    /// The event was understood but refused, e.g. the memo is full.
    Rejected,
    /// Nothing to do for this event in the current state.
    NotHandled,
}

impl KeyResult {
    fn from_bool(handled: bool) -> Self {
        if handled {
            KeyResult::Handled
        } else {
            KeyResult::NotHandled
        }
    }
}

pub struct Session {
    config: Config,
    registry: SharedRegistry,
    dictionary: SharedDictionary,
    history: HistoryStore,
    buffer: TextInputBuffer,
    suggestions: SuggestionEngine,
}

impl Session {
    /// Build a session from `config`.
    ///
    /// Bindings and dictionary load on first use. An unreadable history file
    /// starts an in-memory history instead.
    pub fn new(config: Config) -> Self {
        let registry = SharedRegistry::new(config.bindings_path.clone(), config.catalog_max_expansion);
        let dictionary =
            SharedDictionary::new(config.dictionary_path.clone(), config.dictionary_cache_size);
        let history = Self::open_history(&config);

        Self {
            registry,
            dictionary,
            history,
            buffer: TextInputBuffer::new(config.line_limits()),
            suggestions: SuggestionEngine::new(config.page_size),
            config,
        }
    }

    /// Session over already-loaded data; nothing is read from disk.
    pub fn with_parts(
        config: Config,
        registry: KeyBindingRegistry,
        dictionary: Dictionary,
        history: HistoryStore,
    ) -> Self {
        Self {
            registry: SharedRegistry::preloaded(registry),
            dictionary: SharedDictionary::preloaded(dictionary),
            history,
            buffer: TextInputBuffer::new(config.line_limits()),
            suggestions: SuggestionEngine::new(config.page_size),
            config,
        }
    }

    fn open_history(config: &Config) -> HistoryStore {
        let mut history = match &config.history_path {
            Some(path) => HistoryStore::load(path, config.history_max_count).unwrap_or_else(|e| {
                warn!(error = %e, "history unavailable, keeping it in memory");
                HistoryStore::new(config.history_max_count)
            }),
            None => HistoryStore::new(config.history_max_count),
        };
        history.set_display_count(config.history_display_count);
        history
    }

    // ========== Accessors ==========

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &KeyBindingRegistry {
        self.registry.get()
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.dictionary.get()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn buffer(&self) -> &TextInputBuffer {
        &self.buffer
    }

    pub fn state(&self) -> BufferState {
        self.buffer.state()
    }

    pub fn suggestions(&self) -> &SuggestionEngine {
        &self.suggestions
    }

    pub fn candidates(&self) -> &[Candidate] {
        self.suggestions.candidates()
    }

    // ========== Editing ==========

    /// Append `text` to the pending input; refresh suggestions on success if
    /// asked to.
    pub fn append(&mut self, text: &str, refresh_suggestions: bool) -> bool {
        if !self.buffer.append(text) {
            return false;
        }
        if refresh_suggestions {
            self.update_suggestions();
        }
        true
    }

    pub fn backspace(&mut self) -> bool {
        let removed = self.buffer.backspace();
        if removed {
            self.update_suggestions();
        }
        removed
    }

    /// Commit the pending input and record it in the history.
    pub fn commit(&mut self) -> String {
        self.commit_tagged(None)
    }

    fn commit_tagged(&mut self, sub_key: Option<&str>) -> String {
        let committed = self.buffer.commit();
        if !committed.is_empty() {
            let catalog = self.registry.get().catalog();
            let recorded = self.history.add_entry(&committed, sub_key, catalog);
            debug!(recorded, "committed input");
        }
        self.update_suggestions();
        committed
    }

    pub fn cancel(&mut self) {
        self.buffer.cancel();
        self.update_suggestions();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.update_suggestions();
    }

    /// Recompute suggestions for the current pending input.
    pub fn update_suggestions(&mut self) -> &[Candidate] {
        let sources = SuggestionSources::new()
            .with_history(&self.history)
            .with_dictionary(self.dictionary.get())
            .with_catalog(self.registry.get().catalog());
        self.suggestions.update(self.buffer.pending(), &sources)
    }

    /// Replace the pending input with candidate `index`, commit it, and record
    /// it in the history under the candidate's tag.
    ///
    /// Returns the committed text, or `None` for the sentinel, an unknown
    /// index, or a candidate that does not fit in the memo.
    pub fn accept_candidate(&mut self, index: usize) -> Option<String> {
        let candidate = self.suggestions.candidates().get(index)?.clone();
        if candidate.is_sentinel() {
            return None;
        }
        if !self.buffer.replace_pending(&candidate.value) {
            debug!(value = %candidate.value, "candidate does not fit");
            return None;
        }
        Some(self.commit_tagged(candidate.source_tag.as_deref()))
    }

    /// Act on a bound key: a Literal key appends its text, an Emoji key shows
    /// its label's symbols as candidates. Returns false for an unbound key or a
    /// rejected append.
    pub fn press_key(&mut self, key_no: i64, kind: &str) -> bool {
        let Some(entry) = self.registry.get().find_by_key_no_and_kind(key_no, kind) else {
            debug!(key_no, kind, "no binding for key");
            return false;
        };

        match entry.kind {
            KeyKind::Literal => {
                let text = entry.literal_text().to_string();
                self.append(&text, true)
            }
            KeyKind::Emoji => {
                let label = entry.label.clone();
                let catalog = self.registry.get().catalog();
                !self.suggestions.show_catalog(&label, catalog).is_empty()
            }
        }
    }

    /// Route a keyboard event.
    pub fn handle_key(&mut self, event: KeyEvent) -> KeyResult {
        match event {
            KeyEvent::Text(text) => {
                if self.append(&text, true) {
                    KeyResult::Handled
                } else {
                    KeyResult::Rejected
                }
            }
            KeyEvent::Key { key_no, kind } => {
                if self.registry.get().find_by_key_no_and_kind(key_no, &kind).is_none() {
                    return KeyResult::NotHandled;
                }
                if self.press_key(key_no, &kind) {
                    KeyResult::Handled
                } else {
                    KeyResult::Rejected
                }
            }
            KeyEvent::Backspace => KeyResult::from_bool(self.backspace()),
            KeyEvent::LineBreak => {
                if self.buffer.is_composing() {
                    self.commit();
                    return KeyResult::Handled;
                }
                if self.buffer.append("\n") {
                    self.commit();
                    KeyResult::Handled
                } else {
                    KeyResult::Rejected
                }
            }
            KeyEvent::Commit => {
                if !self.buffer.is_composing() {
                    return KeyResult::NotHandled;
                }
                self.commit();
                KeyResult::Handled
            }
            KeyEvent::Cancel => {
                if !self.buffer.is_composing() {
                    return KeyResult::NotHandled;
                }
                self.cancel();
                KeyResult::Handled
            }
            KeyEvent::Clear => {
                self.clear();
                KeyResult::Handled
            }
            KeyEvent::Select(page_index) => {
                match self.suggestions.list_mut().select_on_page(page_index) {
                    Some(index) => self.accept_result(index),
                    None => KeyResult::NotHandled,
                }
            }
            KeyEvent::Accept => match self.suggestions.list().selected_index() {
                Some(index) => self.accept_result(index),
                None => KeyResult::NotHandled,
            },
            KeyEvent::Up => KeyResult::from_bool(self.suggestions.list_mut().cursor_up()),
            KeyEvent::Down => KeyResult::from_bool(self.suggestions.list_mut().cursor_down()),
            KeyEvent::PageUp => KeyResult::from_bool(self.suggestions.list_mut().page_up()),
            KeyEvent::PageDown => KeyResult::from_bool(self.suggestions.list_mut().page_down()),
        }
    }

    fn accept_result(&mut self, index: usize) -> KeyResult {
        let acceptable = self
            .suggestions
            .candidates()
            .get(index)
            .is_some_and(|c| !c.is_sentinel());
        if !acceptable {
            return KeyResult::NotHandled;
        }
        match self.accept_candidate(index) {
            Some(_) => KeyResult::Handled,
            None => KeyResult::Rejected,
        }
    }

    // ========== Data Files ==========

    /// Reload the key bindings and rebuild the catalog.
    ///
    /// The session always ends up with a usable registry; the error reports
    /// why the configured file was not used.
    pub fn reload_bindings(&mut self) -> Result<()> {
        let result = self.registry.reload();
        self.update_suggestions();
        result
    }

    /// Write the history to its file, if it has one.
    pub fn persist_history(&self) -> Result<()> {
        self.history.save()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.buffer.state())
            .field("candidates", &self.suggestions.candidates().len())
            .field("history", &self.history.len())
            .field("bindings_loaded", &self.registry.is_loaded())
            .field("dictionary_loaded", &self.dictionary.is_loaded())
            .finish()
    }
}

/// Validate `config` and start a session.
pub fn init(config: Config) -> Result<Session> {
    config.validate()?;
    info!(
        max_lines = config.max_lines,
        max_chars_per_line = config.max_chars_per_line,
        "starting session"
    );
    Ok(Session::new(config))
}

/// End a session, persisting its history.
pub fn shutdown(session: Session) -> Result<()> {
    session.persist_history()?;
    info!(history = session.history.len(), "session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::KeyBindingRegistry;
    use crate::candidate::CandidateOrigin;
    use crate::dictionary::DictionaryEntry;

    const BINDINGS: &str = r#"{
        "keys": [
            { "keyNo": 1, "type": "Literal", "label": "period", "char": "。" },
            { "keyNo": 2, "type": "Literal", "label": "ok" },
            { "keyNo": 10, "type": "Emoji", "label": "faces",
              "ranges": [ { "start": "0x1F600", "end": "0x1F602" } ] }
        ],
        "excluded": [ "0x1F601" ]
    }"#;

    fn session() -> Session {
        let registry = KeyBindingRegistry::from_json_str(BINDINGS, 2000).unwrap();
        let dictionary = Dictionary::from_entries(
            vec![
                DictionaryEntry::new(Some("ari".into()), "ありがとう"),
                DictionaryEntry::new(None, "arigato"),
            ],
            16,
        )
        .unwrap();
        Session::with_parts(Config::default(), registry, dictionary, HistoryStore::new(10))
    }

    #[test]
    fn typing_updates_suggestions() {
        let mut s = session();
        assert_eq!(s.handle_key(KeyEvent::Text("ar".into())), KeyResult::Handled);
        let values: Vec<_> = s.candidates().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["", "ありがとう", "arigato"]);
    }

    #[test]
    fn append_without_refresh_keeps_old_candidates() {
        let mut s = session();
        s.append("ar", true);
        s.append("x", false);
        assert_eq!(s.candidates().len(), 3);
        s.update_suggestions();
        assert_eq!(s.candidates().len(), 1);
    }

    #[test]
    fn accepting_candidate_commits_and_records() {
        let mut s = session();
        s.append("ari", true);
        assert_eq!(s.accept_candidate(1).as_deref(), Some("ありがとう"));
        assert_eq!(s.state().confirmed, "ありがとう");
        assert_eq!(s.state().pending, "");
        assert_eq!(s.candidates().len(), 1);

        let record = s.history().records().next().unwrap();
        assert_eq!(record.sub_key.as_deref(), Some("ari"));

        // The history now leads the suggestions for the same reading.
        s.append("ari", true);
        assert_eq!(s.candidates()[1].origin, CandidateOrigin::History);
        assert_eq!(s.candidates()[1].value, "ありがとう");
    }

    #[test]
    fn sentinel_is_not_acceptable() {
        let mut s = session();
        s.append("ar", true);
        assert_eq!(s.accept_candidate(0), None);
        assert_eq!(s.handle_key(KeyEvent::Select(0)), KeyResult::NotHandled);
        assert_eq!(s.accept_candidate(99), None);
    }

    #[test]
    fn literal_and_emoji_keys() {
        let mut s = session();
        assert!(s.press_key(1, "literal"));
        assert!(s.press_key(2, "LITERAL"));
        assert_eq!(s.state().pending, "。ok");

        assert!(s.press_key(10, "emoji"));
        let values: Vec<_> = s.candidates().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["", "\u{1F600}", "\u{1F602}"]);

        assert_eq!(
            s.handle_key(KeyEvent::Key { key_no: 99, kind: "Emoji".into() }),
            KeyResult::NotHandled
        );
    }

    #[test]
    fn selecting_symbol_from_palette() {
        let mut s = session();
        s.press_key(10, "Emoji");
        assert_eq!(s.handle_key(KeyEvent::Down), KeyResult::Handled);
        assert_eq!(s.handle_key(KeyEvent::Accept), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "\u{1F600}");
        // A single registered symbol is worth remembering.
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn line_break_commits_or_inserts() {
        let mut s = session();
        s.handle_key(KeyEvent::Text("ab".into()));
        assert_eq!(s.handle_key(KeyEvent::LineBreak), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "ab");
        assert_eq!(s.handle_key(KeyEvent::LineBreak), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "ab\n");
        assert_eq!(s.handle_key(KeyEvent::LineBreak), KeyResult::Handled);
        assert_eq!(s.handle_key(KeyEvent::LineBreak), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "ab\n\n\n");
        // The memo is on its third line; nothing more fits.
        assert_eq!(s.handle_key(KeyEvent::Text("x".into())), KeyResult::Rejected);
        assert_eq!(s.handle_key(KeyEvent::LineBreak), KeyResult::Rejected);
        assert!(s.history().is_empty());
    }

    #[test]
    fn commit_cancel_clear_events() {
        let mut s = session();
        assert_eq!(s.handle_key(KeyEvent::Commit), KeyResult::NotHandled);
        s.handle_key(KeyEvent::Text("hello".into()));
        assert_eq!(s.handle_key(KeyEvent::Commit), KeyResult::Handled);
        s.handle_key(KeyEvent::Text(" there".into()));
        assert_eq!(s.handle_key(KeyEvent::Cancel), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "hello");
        assert_eq!(s.handle_key(KeyEvent::Backspace), KeyResult::Handled);
        assert_eq!(s.state().confirmed, "hell");
        assert_eq!(s.handle_key(KeyEvent::Clear), KeyResult::Handled);
        assert_eq!(s.handle_key(KeyEvent::Backspace), KeyResult::NotHandled);
    }

    #[test]
    fn init_rejects_invalid_config_and_shutdown_saves() {
        let mut bad = Config::default();
        bad.page_size = 0;
        assert!(init(bad).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        let mut s = init(Config::default().with_history_path(&path)).unwrap();
        s.append("hello", false);
        s.commit();
        shutdown(s).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
