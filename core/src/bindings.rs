//! Key bindings and the emoji/symbol catalog.
//!
//! A binding definition is a JSON document listing the keyboard's keys. A key
//! is either a `Literal` (types a fixed string) or an `Emoji` key whose label
//! names a palette built from declarative codepoint ranges:
//!
//! ```json
//! { "keys": [ { "keyNo": 10, "type": "Emoji", "label": "faces",
//!               "ranges": [ { "start": "0x1F600", "end": "0x1F64F" } ] } ],
//!   "excluded": [ "0x1F610" ] }
//! ```
//!
//! The catalog is derived: it is rebuilt wholesale whenever the definition is
//! (re)loaded and never edited in place.

use crate::error::{Error, Result};
use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Binding definition compiled into the crate, used when the user's file is
/// missing or unreadable.
pub const PACKAGED_DEFAULT: &str = include_str!("../data/default_bindings.json");

/// Default cap on how many codepoints a single label may expand to.
pub const DEFAULT_MAX_EXPANSION: u32 = 2000;

/// Highest Unicode scalar value.
pub const MAX_CODEPOINT: u32 = 0x10FFFF;

/// Codepoints removed from every range during expansion.
pub type ExclusionSet = AHashSet<u32>;

/// What a key produces when tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Emoji,
    Literal,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Emoji => "Emoji",
            KeyKind::Literal => "Literal",
        }
    }
}

impl FromStr for KeyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("emoji") {
            Ok(KeyKind::Emoji)
        } else if s.eq_ignore_ascii_case("literal") {
            Ok(KeyKind::Literal)
        } else {
            Err(format!("unknown key type '{}'", s))
        }
    }
}

/// Inclusive range of Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodepointRange {
    pub start: u32,
    pub end: u32,
}

impl CodepointRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// `1 <= start <= end <= 0x10FFFF`.
    pub fn is_valid(&self) -> bool {
        1 <= self.start && self.start <= self.end && self.end <= MAX_CODEPOINT
    }

    /// Number of codepoints covered. Only meaningful for valid ranges.
    pub fn span(&self) -> u32 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }
}

/// One key of the on-screen keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingEntry {
    pub key_no: i64,
    pub kind: KeyKind,
    pub label: String,
    pub char: Option<String>,
    pub ranges: Vec<CodepointRange>,
}

impl BindingEntry {
    /// Text a literal key types: its `char`, falling back to the label.
    pub fn literal_text(&self) -> &str {
        self.char.as_deref().unwrap_or(&self.label)
    }
}

/// Parse a codepoint written as `0x1F600`, `U+1F600` or decimal `128512`.
///
/// Returns `None` for malformed text, zero, and anything above `0x10FFFF`.
///
/// ```
/// use softkey_core::bindings::parse_codepoint;
///
/// assert_eq!(parse_codepoint("0x1F600"), Some(0x1F600));
/// assert_eq!(parse_codepoint("U+1F600"), Some(0x1F600));
/// assert_eq!(parse_codepoint("128512"), Some(0x1F600));
/// assert_eq!(parse_codepoint("0x110000"), None);
/// assert_eq!(parse_codepoint("smile"), None);
/// ```
pub fn parse_codepoint(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix("U+"))
        .or_else(|| s.strip_prefix("u+"));

    let value = match hex {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            u32::from_str_radix(digits, 16).ok()?
        }
        Some(_) => return None,
        None if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s.parse::<u32>().ok()?,
        None => return None,
    };

    if value == 0 || value > MAX_CODEPOINT {
        None
    } else {
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    keys: Vec<RawKey>,
    #[serde(default)]
    excluded: Vec<CodepointText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKey {
    key_no: i64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    char: Option<String>,
    #[serde(default)]
    ranges: Vec<RawRange>,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    start: CodepointText,
    end: CodepointText,
}

/// Codepoints are normally strings, but plain JSON numbers are tolerated.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CodepointText {
    Text(String),
    Number(i64),
}

impl CodepointText {
    fn parse(&self) -> Option<u32> {
        match self {
            CodepointText::Text(s) => parse_codepoint(s),
            CodepointText::Number(n) => u32::try_from(*n)
                .ok()
                .filter(|v| (1..=MAX_CODEPOINT).contains(v)),
        }
    }
}

impl std::fmt::Display for CodepointText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodepointText::Text(s) => write!(f, "{}", s),
            CodepointText::Number(n) => write!(f, "{}", n),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Label → ordered list of symbol strings.
#[derive(Debug, Clone, Default)]
pub struct EmojiCatalog {
    /// Labels in first-definition order.
    labels: Vec<String>,
    entries: AHashMap<String, Vec<String>>,
    /// Symbol → indices into `labels`.
    symbol_labels: AHashMap<String, Vec<usize>>,
}

impl EmojiCatalog {
    /// Symbols listed under `label`.
    pub fn get(&self, label: &str) -> Option<&[String]> {
        self.entries.get(label).map(Vec::as_slice)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// `(label, symbols)` pairs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.labels
            .iter()
            .filter_map(move |label| self.get(label).map(|symbols| (label.as_str(), symbols)))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of distinct symbols across all labels.
    pub fn symbol_count(&self) -> usize {
        self.symbol_labels.len()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// True when `text` is exactly one symbol produced by the catalog.
    pub fn is_symbol(&self, text: &str) -> bool {
        self.symbol_labels.contains_key(text)
    }

    pub fn labels_for_symbol(&self, symbol: &str) -> Vec<&str> {
        self.symbol_labels
            .get(symbol)
            .map(|idxs| idxs.iter().map(|&i| self.labels[i].as_str()).collect())
            .unwrap_or_default()
    }

    /// Labels whose palette `text` should expand to: the label itself when
    /// `text` is an exact label, otherwise every label containing `text` as a
    /// symbol.
    pub fn expansion_labels(&self, text: &str) -> Vec<&str> {
        if let Some(label) = self.labels.iter().find(|l| l.as_str() == text) {
            return vec![label.as_str()];
        }
        self.labels_for_symbol(text)
    }

    fn push(&mut self, label: String, symbols: Vec<String>) {
        let idx = self.labels.len();
        for symbol in &symbols {
            self.symbol_labels.entry(symbol.clone()).or_default().push(idx);
        }
        self.labels.push(label.clone());
        self.entries.insert(label, symbols);
    }
}

/// Expand every Emoji entry's ranges into the catalog.
///
/// Invalid ranges, and ranges that would take a label past `max_expansion`
/// codepoints, are skipped whole. Excluded codepoints and non-scalar values
/// (surrogates) never appear. Labels with no surviving codepoint get no entry.
pub fn build_catalog(
    keys: &[BindingEntry],
    excluded: &ExclusionSet,
    max_expansion: u32,
) -> EmojiCatalog {
    struct Expansion {
        codepoints: Vec<u32>,
        seen: AHashSet<u32>,
        budget: u64,
    }

    let mut order: Vec<String> = Vec::new();
    let mut expanded: AHashMap<String, Expansion> = AHashMap::new();

    for entry in keys.iter().filter(|k| k.kind == KeyKind::Emoji) {
        let expansion = expanded.entry(entry.label.clone()).or_insert_with(|| {
            order.push(entry.label.clone());
            Expansion {
                codepoints: Vec::new(),
                seen: AHashSet::new(),
                budget: 0,
            }
        });

        for range in &entry.ranges {
            if !range.is_valid() {
                warn!(
                    label = %entry.label,
                    start = %hex(range.start),
                    end = %hex(range.end),
                    "skipping invalid codepoint range"
                );
                continue;
            }
            let span = u64::from(range.span());
            if expansion.budget + span > u64::from(max_expansion) {
                warn!(
                    label = %entry.label,
                    span,
                    max_expansion,
                    "skipping codepoint range that exceeds the expansion cap"
                );
                continue;
            }
            expansion.budget += span;

            for cp in range.start..=range.end {
                if excluded.contains(&cp) || !expansion.seen.insert(cp) {
                    continue;
                }
                expansion.codepoints.push(cp);
            }
        }
    }

    let mut catalog = EmojiCatalog::default();
    for label in order {
        let Some(expansion) = expanded.remove(&label) else {
            continue;
        };
        let symbols: Vec<String> = expansion
            .codepoints
            .into_iter()
            .filter_map(|cp| {
                let ch = char::from_u32(cp);
                if ch.is_none() {
                    debug!(codepoint = %hex(cp), "not a scalar value");
                }
                ch
            })
            .map(String::from)
            .collect();
        if !symbols.is_empty() {
            catalog.push(label, symbols);
        }
    }
    catalog
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Where a registry's definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOrigin {
    File,
    PackagedDefault,
    Empty,
}

/// Parsed key bindings plus the catalog derived from them.
#[derive(Debug, Clone)]
pub struct KeyBindingRegistry {
    keys: Vec<BindingEntry>,
    excluded: ExclusionSet,
    catalog: EmojiCatalog,
    origin: BindingOrigin,
}

/// Result of [`KeyBindingRegistry::load`]: always a usable registry, plus the
/// failure that forced a fallback, if any.
#[derive(Debug)]
pub struct LoadOutcome {
    pub registry: KeyBindingRegistry,
    pub error: Option<Error>,
}

impl KeyBindingRegistry {
    /// Registry with no keys and an empty catalog.
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            excluded: ExclusionSet::new(),
            catalog: EmojiCatalog::default(),
            origin: BindingOrigin::Empty,
        }
    }

    /// Build from an already-parsed key list.
    pub fn from_entries(
        keys: Vec<BindingEntry>,
        excluded: ExclusionSet,
        max_expansion: u32,
    ) -> Self {
        let catalog = build_catalog(&keys, &excluded, max_expansion);
        Self {
            keys,
            excluded,
            catalog,
            origin: BindingOrigin::File,
        }
    }

    /// Parse a JSON binding definition.
    pub fn from_json_str(text: &str, max_expansion: u32) -> serde_json::Result<Self> {
        let raw: RawDefinition = serde_json::from_str(text)?;
        Ok(Self::from_raw(raw, max_expansion))
    }

    /// The definition compiled into the crate, or an empty registry if it is
    /// somehow unusable.
    pub fn packaged_default(max_expansion: u32) -> Self {
        match Self::from_json_str(PACKAGED_DEFAULT, max_expansion) {
            Ok(mut registry) => {
                registry.origin = BindingOrigin::PackagedDefault;
                registry
            }
            Err(e) => {
                warn!(error = %e, "packaged binding definition is unusable");
                Self::empty()
            }
        }
    }

    /// Load from `path`, falling back to the packaged default.
    pub fn load<P: AsRef<Path>>(path: P, max_expansion: u32) -> LoadOutcome {
        Self::load_with_default(path, PACKAGED_DEFAULT, max_expansion)
    }

    /// Load from `path`, falling back to `default_text`.
    ///
    /// - missing file: use the default.
    /// - unreadable file: use the default and report the I/O error.
    /// - corrupt file: rename it with a timestamp suffix, write the default in
    ///   its place, use the default and report the parse error.
    /// - unusable default: empty registry.
    pub fn load_with_default<P: AsRef<Path>>(
        path: P,
        default_text: &str,
        max_expansion: u32,
    ) -> LoadOutcome {
        let path = path.as_ref();

        let error = match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_json_str(&text, max_expansion) {
                Ok(registry) => {
                    info!(
                        path = %path.display(),
                        keys = registry.keys.len(),
                        labels = registry.catalog.len(),
                        "loaded key bindings"
                    );
                    return LoadOutcome {
                        registry,
                        error: None,
                    };
                }
                Err(source) => {
                    let err = Error::BindingFormat {
                        path: path.to_path_buf(),
                        source,
                    };
                    warn!(error = %err, "falling back to packaged key bindings");
                    backup_and_replace(path, default_text);
                    Some(err)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no binding file, using packaged default");
                None
            }
            Err(e) => {
                let err = Error::io(path, e);
                warn!(error = %err, "falling back to packaged key bindings");
                Some(err)
            }
        };

        match Self::from_json_str(default_text, max_expansion) {
            Ok(mut registry) => {
                registry.origin = BindingOrigin::PackagedDefault;
                LoadOutcome { registry, error }
            }
            Err(source) => {
                let default_err = Error::PackagedDefault(source);
                warn!(error = %default_err, "continuing with an empty key binding registry");
                LoadOutcome {
                    registry: Self::empty(),
                    error: Some(error.unwrap_or(default_err)),
                }
            }
        }
    }

    fn from_raw(raw: RawDefinition, max_expansion: u32) -> Self {
        let mut excluded = ExclusionSet::new();
        for text in &raw.excluded {
            match text.parse() {
                Some(cp) => {
                    excluded.insert(cp);
                }
                None => warn!(value = %text, "ignoring unparsable excluded codepoint"),
            }
        }

        let mut keys = Vec::with_capacity(raw.keys.len());
        for key in raw.keys {
            let kind = match key.kind.parse::<KeyKind>() {
                Ok(kind) => kind,
                Err(reason) => {
                    warn!(key_no = key.key_no, %reason, "skipping key");
                    continue;
                }
            };

            let ranges = key
                .ranges
                .iter()
                .filter_map(|r| match (r.start.parse(), r.end.parse()) {
                    (Some(start), Some(end)) => Some(CodepointRange { start, end }),
                    _ => {
                        warn!(
                            key_no = key.key_no,
                            start = %r.start,
                            end = %r.end,
                            "ignoring range with unparsable bound"
                        );
                        None
                    }
                })
                .collect();

            keys.push(BindingEntry {
                key_no: key.key_no,
                kind,
                label: key.label,
                char: key.char,
                ranges,
            });
        }

        Self::from_entries(keys, excluded, max_expansion)
    }

    pub fn keys(&self) -> &[BindingEntry] {
        &self.keys
    }

    pub fn excluded(&self) -> &ExclusionSet {
        &self.excluded
    }

    pub fn catalog(&self) -> &EmojiCatalog {
        &self.catalog
    }

    pub fn origin(&self) -> BindingOrigin {
        self.origin
    }

    /// First key with `key_no` whose kind matches `kind` case-insensitively.
    pub fn find_by_key_no_and_kind(&self, key_no: i64, kind: &str) -> Option<&BindingEntry> {
        self.keys
            .iter()
            .find(|k| k.key_no == key_no && k.kind.as_str().eq_ignore_ascii_case(kind))
    }

    pub fn find_by_key_no_and_key_kind(&self, key_no: i64, kind: KeyKind) -> Option<&BindingEntry> {
        self.keys
            .iter()
            .find(|k| k.key_no == key_no && k.kind == kind)
    }
}

fn hex(cp: u32) -> String {
    format!("U+{:04X}", cp)
}

/// Move a corrupt definition aside and put `default_text` in its place.
/// Failures are logged; the caller falls back to the default either way.
fn backup_and_replace(path: &Path, default_text: &str) -> Option<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bindings".to_string());
    let backup = path.with_file_name(format!("{}.{}.bak", file_name, stamp));

    if let Err(e) = std::fs::rename(path, &backup) {
        warn!(path = %path.display(), error = %e, "could not back up corrupt binding file");
        return None;
    }
    warn!(backup = %backup.display(), "backed up corrupt binding file");

    if let Err(e) = std::fs::write(path, default_text) {
        warn!(path = %path.display(), error = %e, "could not restore default binding file");
    }
    Some(backup)
}

/// Lazily loaded registry.
///
/// The first call to [`SharedRegistry::get`] loads the definition; concurrent
/// first calls block on that single load and never see a partial registry.
/// Later reads are lock-free.
#[derive(Debug)]
pub struct SharedRegistry {
    path: Option<PathBuf>,
    max_expansion: u32,
    cell: OnceCell<KeyBindingRegistry>,
}

impl SharedRegistry {
    /// Registry backed by `path`; `None` uses the packaged default.
    pub fn new(path: Option<PathBuf>, max_expansion: u32) -> Self {
        Self {
            path,
            max_expansion,
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-built registry.
    pub fn preloaded(registry: KeyBindingRegistry) -> Self {
        Self {
            path: None,
            max_expansion: DEFAULT_MAX_EXPANSION,
            cell: OnceCell::from(registry),
        }
    }

    pub fn get(&self) -> &KeyBindingRegistry {
        self.cell.get_or_init(|| self.load().registry)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Discard the current registry and load again from the source.
    pub fn reload(&mut self) -> Result<()> {
        let outcome = self.load();
        self.cell = OnceCell::from(outcome.registry);
        match outcome.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn load(&self) -> LoadOutcome {
        match &self.path {
            Some(path) => KeyBindingRegistry::load(path, self.max_expansion),
            None => LoadOutcome {
                registry: KeyBindingRegistry::packaged_default(self.max_expansion),
                error: None,
            },
        }
    }
}
