//! Bounded log of previously committed input.
//!
//! Records are kept oldest-first. Re-adding an existing `(sub_key, value)`
//! pair moves it to the newest position instead of duplicating it, and the
//! store evicts from the oldest end whenever it grows past `max_count`.
//!
//! Persistence is a plain newline-delimited file, oldest first. Each line is
//! `subKey,value` (split on the first comma) or a bare `value`.

use crate::bindings::EmojiCatalog;
use crate::error::{Error, Result};
use crate::grapheme::{starts_with_text_element, text_element_count};
use ahash::AHashSet;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default bound on stored records.
pub const DEFAULT_MAX_COUNT: usize = 300;
/// Default number of records returned by [`HistoryStore::matches`].
pub const DEFAULT_DISPLAY_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryRecord {
    pub sub_key: Option<String>,
    pub value: String,
}

impl HistoryRecord {
    pub fn new<V: Into<String>>(sub_key: Option<String>, value: V) -> Self {
        Self {
            sub_key,
            value: value.into(),
        }
    }

    fn to_line(&self) -> String {
        match &self.sub_key {
            Some(key) => format!("{},{}", key, self.value),
            // Keep a bare value containing a comma from being read back as a key.
            None if self.value.contains(',') => format!(",{}", self.value),
            None => self.value.clone(),
        }
    }

    fn from_line(line: &str) -> Option<Self> {
        let (sub_key, value) = match line.split_once(',') {
            Some((key, value)) if key.is_empty() => (None, value),
            Some((key, value)) => (Some(key.to_string()), value),
            None => (None, line),
        };
        if value.is_empty() {
            return None;
        }
        Some(Self::new(sub_key, value))
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    records: VecDeque<HistoryRecord>,
    max_count: usize,
    display_count: usize,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// Create an empty, in-memory store.
    pub fn new(max_count: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_count,
            display_count: DEFAULT_DISPLAY_COUNT,
            path: None,
        }
    }

    /// Open the store persisted at `path`.
    ///
    /// A missing file yields an empty store bound to `path`; any other read
    /// failure is returned.
    pub fn load<P: AsRef<Path>>(path: P, max_count: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Self::new(max_count);
        store.path = Some(path.to_path_buf());

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no history file yet");
                return Ok(store);
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match HistoryRecord::from_line(line) {
                Some(record) => store.push_record(record),
                None => warn!(line, "ignoring malformed history line"),
            }
        }
        store.evict_overflow();

        info!(path = %path.display(), records = store.len(), "loaded input history");
        Ok(store)
    }

    /// Set the file used by [`HistoryStore::save`] and [`HistoryStore::clear`].
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a committed string.
    ///
    /// Line breaks are stripped first. Empty values are rejected, as are
    /// values of fewer than two grapheme clusters unless the value is itself a
    /// symbol from `catalog`. Returns whether the value was recorded.
    pub fn add_entry(
        &mut self,
        value: &str,
        sub_key: Option<&str>,
        catalog: &EmojiCatalog,
    ) -> bool {
        let value: String = value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
        if value.is_empty() {
            return false;
        }
        if !catalog.is_symbol(&value) && text_element_count(&value) < 2 {
            return false;
        }

        let sub_key = sub_key
            .filter(|k| !k.is_empty() && !k.contains([',', '\r', '\n']))
            .map(str::to_string);

        self.push_record(HistoryRecord::new(sub_key, value));
        self.evict_overflow();
        true
    }

    /// Records whose sub key or value starts with `prefix`, newest first.
    ///
    /// Each value appears once (its newest record) and at most
    /// `display_count` records are returned.
    pub fn matches(&self, prefix: &str) -> Vec<HistoryRecord> {
        let mut seen: AHashSet<&str> = AHashSet::new();
        self.records
            .iter()
            .rev()
            .filter(|r| {
                starts_with_text_element(&r.value, prefix)
                    || r
                        .sub_key
                        .as_deref()
                        .is_some_and(|k| starts_with_text_element(k, prefix))
            })
            .filter(|r| seen.insert(r.value.as_str()))
            .take(self.display_count)
            .cloned()
            .collect()
    }

    /// Drop every record and delete the persisted file.
    pub fn clear(&mut self) {
        self.records.clear();
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed history file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove history file"),
            }
        }
    }

    /// Change the bound, evicting the oldest records if now over it.
    pub fn set_max_count(&mut self, max_count: usize) {
        self.max_count = max_count;
        self.evict_overflow();
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn set_display_count(&mut self, display_count: usize) {
        self.display_count = display_count;
    }

    pub fn display_count(&self) -> usize {
        self.display_count
    }

    /// Records oldest first.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the store to its path. A store without a path is a no-op.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Write the store to `path`, replacing any previous file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut content = String::new();
        for record in &self.records {
            content.push_str(&record.to_line());
            content.push('\n');
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), records = self.records.len(), "saved input history");
        Ok(())
    }

    fn push_record(&mut self, record: HistoryRecord) {
        self.records.retain(|r| r != &record);
        self.records.push_back(record);
    }

    fn evict_overflow(&mut self) {
        while self.records.len() > self.max_count {
            self.records.pop_front();
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::KeyBindingRegistry;

    fn catalog() -> EmojiCatalog {
        let json = r#"{ "keys": [ { "keyNo": 1, "type": "Emoji", "label": "faces",
            "ranges": [ { "start": "0x1F600", "end": "0x1F602" } ] } ] }"#;
        KeyBindingRegistry::from_json_str(json, 2000)
            .unwrap()
            .catalog()
            .clone()
    }

    fn values(store: &HistoryStore) -> Vec<&str> {
        store.records().map(|r| r.value.as_str()).collect()
    }

    #[test]
    fn evicts_oldest_beyond_max() {
        let cat = catalog();
        let mut store = HistoryStore::new(2);
        assert!(store.add_entry("aa", None, &cat));
        assert!(store.add_entry("bb", None, &cat));
        assert!(store.add_entry("cc", None, &cat));
        assert_eq!(values(&store), vec!["bb", "cc"]);
    }

    #[test]
    fn duplicate_moves_to_newest() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        store.add_entry("xy", Some("k"), &cat);
        store.add_entry("other", None, &cat);
        store.add_entry("xy", Some("k"), &cat);
        assert_eq!(store.len(), 2);
        let newest = store.records().next_back().unwrap();
        assert_eq!(newest, &HistoryRecord::new(Some("k".into()), "xy"));
    }

    #[test]
    fn same_value_different_key_is_distinct() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        store.add_entry("xy", Some("a"), &cat);
        store.add_entry("xy", Some("b"), &cat);
        store.add_entry("xy", None, &cat);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn rejects_empty_and_single_plain_characters() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        assert!(!store.add_entry("", None, &cat));
        assert!(!store.add_entry("a", None, &cat));
        assert!(!store.add_entry("\n", None, &cat));
        assert!(!store.add_entry("\u{1F468}\u{200D}\u{1F469}", None, &cat));
        assert!(store.add_entry("\u{1F601}", None, &cat));
        assert_eq!(values(&store), vec!["\u{1F601}"]);
    }

    #[test]
    fn strips_line_breaks_and_bad_sub_keys() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        store.add_entry("ab\ncd", Some("a,b"), &cat);
        let rec = store.records().next().unwrap();
        assert_eq!(rec.value, "abcd");
        assert_eq!(rec.sub_key, None);
    }

    #[test]
    fn matches_newest_first_on_value_or_key() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        store.add_entry("hello", None, &cat);
        store.add_entry("ありがとう", Some("arigato"), &cat);
        store.add_entry("help", None, &cat);
        store.add_entry("world", None, &cat);

        let hits: Vec<_> = store.matches("hel").into_iter().map(|r| r.value).collect();
        assert_eq!(hits, vec!["help", "hello"]);

        let hits = store.matches("ari");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "ありがとう");
    }

    #[test]
    fn matches_dedups_values_and_caps() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        store.add_entry("abc", Some("x"), &cat);
        store.add_entry("abc", Some("y"), &cat);
        store.add_entry("abd", None, &cat);
        store.add_entry("abe", None, &cat);
        store.set_display_count(2);

        let hits = store.matches("ab");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].value, "abe");
        assert_eq!(hits[1].value, "abd");

        store.set_display_count(10);
        let hits = store.matches("ab");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[2].sub_key.as_deref(), Some("y"));
    }

    #[test]
    fn shrinking_max_count_evicts_immediately() {
        let cat = catalog();
        let mut store = HistoryStore::new(10);
        for v in ["aa", "bb", "cc", "dd"] {
            store.add_entry(v, None, &cat);
        }
        store.set_max_count(2);
        assert_eq!(values(&store), vec!["cc", "dd"]);
    }

    #[test]
    fn line_format_round_trips_commas() {
        let bare = HistoryRecord::new(None, "a,b");
        assert_eq!(bare.to_line(), ",a,b");
        assert_eq!(HistoryRecord::from_line(",a,b"), Some(bare));

        let keyed = HistoryRecord::new(Some("k".into()), "v,w");
        assert_eq!(keyed.to_line(), "k,v,w");
        assert_eq!(HistoryRecord::from_line("k,v,w"), Some(keyed));

        assert_eq!(HistoryRecord::from_line("k,"), None);
    }

    #[test]
    fn save_load_and_clear() {
        let cat = catalog();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let mut store = HistoryStore::load(&path, 10).unwrap();
        assert!(store.is_empty());
        store.add_entry("first", None, &cat);
        store.add_entry("second", Some("2nd"), &cat);
        store.save().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\n2nd,second\n");

        let mut reloaded = HistoryStore::load(&path, 10).unwrap();
        assert_eq!(values(&reloaded), vec!["first", "second"]);

        reloaded.clear();
        assert!(reloaded.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn load_applies_bound_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        std::fs::write(&path, "aa\nbb\naa\ncc\n\n").unwrap();

        let store = HistoryStore::load(&path, 2).unwrap();
        assert_eq!(values(&store), vec!["aa", "cc"]);
    }
}
