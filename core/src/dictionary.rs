//! Static word dictionary consulted by the suggestion engine.
//!
//! The dictionary is a read-only, ordered list of `(key, value)` pairs. A
//! query matches an entry when its search term (the key if present, the value
//! otherwise) starts with the query at grapheme granularity. Results come back
//! in the dictionary's natural order.
//!
//! Search terms are indexed in an `fst::Map` for byte-prefix pre-filtering;
//! the grapheme check then confirms each hit. Recent queries are cached.
//!
//! Storage formats:
//! - JSON: an array of `{ "key": string?, "value": string }` objects.
//! - bincode: the entry list written by [`Dictionary::save_bincode`].

use crate::error::{Error, Result};
use crate::grapheme::starts_with_text_element;
use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, Streamer};
use lru::LruCache;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Default number of cached prefix queries.
pub const DEFAULT_CACHE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default)]
    pub key: Option<String>,
    pub value: String,
}

impl DictionaryEntry {
    pub fn new<V: Into<String>>(key: Option<String>, value: V) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// The text queries are matched against.
    pub fn search_term(&self) -> &str {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => &self.value,
        }
    }
}

/// Prefix search over an ordered word list.
///
/// Implementations return matches in their own natural order.
pub trait DictionarySource {
    fn search_dictionary(&self, prefix: &str) -> Vec<DictionaryEntry>;
}

/// In-memory dictionary with an fst prefix index.
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    /// Search term -> index into `groups`.
    index: Map<Vec<u8>>,
    /// Entry indices sharing a search term, ascending.
    groups: Vec<Vec<usize>>,
    cache: Mutex<LruCache<String, Vec<usize>>>,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl Dictionary {
    /// Build from entries in natural order. Entries with an empty value are
    /// dropped.
    pub fn from_entries(entries: Vec<DictionaryEntry>, cache_size: usize) -> Result<Self> {
        let entries: Vec<DictionaryEntry> =
            entries.into_iter().filter(|e| !e.value.is_empty()).collect();

        let mut terms: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            terms.entry(entry.search_term()).or_default().push(i);
        }

        let mut builder = fst::MapBuilder::memory();
        let mut groups = Vec::with_capacity(terms.len());
        for (term, idxs) in terms {
            builder.insert(term, groups.len() as u64)?;
            groups.push(idxs);
        }
        let index = Map::new(builder.into_inner()?)?;

        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            entries,
            index,
            groups,
            cache: Mutex::new(LruCache::new(capacity)),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        })
    }

    /// Dictionary with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            index: Map::default(),
            groups: Vec::new(),
            cache: Mutex::new(LruCache::new(NonZeroUsize::MIN)),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        }
    }

    /// Load a JSON word list.
    pub fn load_json<P: AsRef<Path>>(path: P, cache_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let entries: Vec<DictionaryEntry> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::DictionaryFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), entries = entries.len(), "loaded JSON dictionary");
        Self::from_entries(entries, cache_size)
    }

    /// Save the entry list as a bincode snapshot.
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &self.entries).map_err(|e| Error::DictionaryFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Load a snapshot produced by [`Dictionary::save_bincode`].
    pub fn load_bincode<P: AsRef<Path>>(path: P, cache_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let entries: Vec<DictionaryEntry> = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| Error::DictionaryFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), entries = entries.len(), "loaded dictionary snapshot");
        Self::from_entries(entries, cache_size)
    }

    /// Load by extension: `.json` is read as JSON, anything else as bincode.
    pub fn load<P: AsRef<Path>>(path: P, cache_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::load_json(path, cache_size)
        } else {
            Self::load_bincode(path, cache_size)
        }
    }

    /// Entries in natural order.
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of matching entries, ascending.
    fn matching_indices(&self, prefix: &str) -> Vec<usize> {
        if prefix.is_empty() {
            return (0..self.entries.len()).collect();
        }

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(prefix) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return cached.clone();
            }
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let mut hits = Vec::new();
        let mut stream = self.index.search(Str::new(prefix).starts_with()).into_stream();
        while let Some((term, group)) = stream.next() {
            let confirmed = std::str::from_utf8(term)
                .map(|term| starts_with_text_element(term, prefix))
                .unwrap_or(false);
            if confirmed {
                if let Some(idxs) = self.groups.get(group as usize) {
                    hits.extend_from_slice(idxs);
                }
            }
        }
        hits.sort_unstable();
        debug!(prefix, hits = hits.len(), "dictionary lookup");

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(prefix.to_string(), hits.clone());
        }
        hits
    }

    // ========== Cache statistics ==========

    /// `(hits, misses)` since creation or the last [`Dictionary::clear_cache`].
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    /// Hit rate as a percentage, or `None` before the first lookup.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        let (hits, misses) = self.cache_stats();
        let total = hits + misses;
        if total == 0 {
            None
        } else {
            Some((hits as f32 / total as f32) * 100.0)
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }
}

impl DictionarySource for Dictionary {
    fn search_dictionary(&self, prefix: &str) -> Vec<DictionaryEntry> {
        self.matching_indices(prefix)
            .into_iter()
            .filter_map(|i| self.entries.get(i).cloned())
            .collect()
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("entries", &self.entries.len())
            .field("terms", &self.groups.len())
            .field("cache_stats", &self.cache_stats())
            .finish()
    }
}

/// Plain word lists are dictionaries too; useful for hosts and tests.
impl DictionarySource for [DictionaryEntry] {
    fn search_dictionary(&self, prefix: &str) -> Vec<DictionaryEntry> {
        self.iter()
            .filter(|e| !e.value.is_empty() && starts_with_text_element(e.search_term(), prefix))
            .cloned()
            .collect()
    }
}

impl DictionarySource for Vec<DictionaryEntry> {
    fn search_dictionary(&self, prefix: &str) -> Vec<DictionaryEntry> {
        self.as_slice().search_dictionary(prefix)
    }
}

/// Dictionary loaded on first use.
///
/// A dictionary that fails to load is logged and replaced by an empty one so
/// suggestions keep working from the other sources.
#[derive(Debug)]
pub struct SharedDictionary {
    path: Option<PathBuf>,
    cache_size: usize,
    cell: OnceCell<Dictionary>,
}

impl SharedDictionary {
    /// Dictionary backed by `path`; `None` is an empty dictionary.
    pub fn new(path: Option<PathBuf>, cache_size: usize) -> Self {
        Self {
            path,
            cache_size,
            cell: OnceCell::new(),
        }
    }

    pub fn preloaded(dictionary: Dictionary) -> Self {
        Self {
            path: None,
            cache_size: DEFAULT_CACHE_SIZE,
            cell: OnceCell::from(dictionary),
        }
    }

    pub fn get(&self) -> &Dictionary {
        self.cell.get_or_init(|| match &self.path {
            Some(path) => Dictionary::load(path, self.cache_size).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "dictionary unavailable");
                Dictionary::empty()
            }),
            None => Dictionary::empty(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
