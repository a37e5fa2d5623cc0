//! softkey-core
//!
//! Input engine for a constrained on-screen keyboard that edits a short,
//! fixed-width memo.
//!
//! Public API:
//! - `TextInputBuffer` - confirmed/pending memo text with line and width limits
//! - `KeyBindingRegistry` - key definitions and the symbol catalog built from them
//! - `HistoryStore` - bounded, persisted log of committed input
//! - `Dictionary` - static word list with prefix search
//! - `SuggestionEngine` - merged, deduplicated candidates for the pending input
//! - `Session` - owns all of the above and routes keyboard events
//! - `Config` - limits, capacities and data file locations
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod grapheme;
pub use grapheme::starts_with_text_element;

pub mod metrics;
pub use metrics::{cut_to_width, fits_within_lines, insert_line_breaks, weighted_length, CutResult};

pub mod bindings;
pub use bindings::{
    parse_codepoint, BindingEntry, BindingOrigin, CodepointRange, EmojiCatalog, KeyBindingRegistry,
    KeyKind, LoadOutcome, SharedRegistry,
};

pub mod history;
pub use history::{HistoryRecord, HistoryStore};

pub mod dictionary;
pub use dictionary::{Dictionary, DictionaryEntry, DictionarySource, SharedDictionary};

pub mod input_buffer;
pub use input_buffer::{BufferState, LineLimits, TextInputBuffer};

pub mod candidate;
pub use candidate::{Candidate, CandidateList, CandidateOrigin};

pub mod suggestion;
pub use suggestion::{collect_suggestions, SuggestionEngine, SuggestionSources};

pub mod session;
pub use session::{init, shutdown, KeyEvent, KeyResult, Session};

/// Engine configuration.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Visible memo lines.
    pub max_lines: usize,
    /// Line width in weight units (half-width glyphs weigh 0.5).
    pub max_chars_per_line: f64,

    /// Records kept in the input history.
    pub history_max_count: usize,
    /// History matches offered per suggestion update.
    pub history_display_count: usize,

    /// Most codepoints a single catalog label may expand to.
    pub catalog_max_expansion: u32,

    /// Candidates per page.
    pub page_size: usize,
    /// Cached dictionary prefix queries.
    pub dictionary_cache_size: usize,

    /// Key binding definition; the packaged default is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings_path: Option<PathBuf>,
    /// History file; history is kept in memory only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
    /// Word list (`.json`) or dictionary snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_lines: input_buffer::DEFAULT_MAX_LINES,
            max_chars_per_line: input_buffer::DEFAULT_MAX_WEIGHT_PER_LINE,
            history_max_count: history::DEFAULT_MAX_COUNT,
            history_display_count: history::DEFAULT_DISPLAY_COUNT,
            catalog_max_expansion: bindings::DEFAULT_MAX_EXPANSION,
            page_size: 5,
            dictionary_cache_size: dictionary::DEFAULT_CACHE_SIZE,
            bindings_path: None,
            history_path: None,
            dictionary_path: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_lines == 0 {
            return Err(Error::ConfigValidation("max_lines must be at least 1".into()));
        }
        if !(self.max_chars_per_line.is_finite() && self.max_chars_per_line > 0.0) {
            return Err(Error::ConfigValidation(format!(
                "max_chars_per_line must be positive, got {}",
                self.max_chars_per_line
            )));
        }
        if self.history_max_count == 0 {
            return Err(Error::ConfigValidation(
                "history_max_count must be at least 1".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::ConfigValidation("page_size must be at least 1".into()));
        }
        Ok(())
    }

    // ========== Memo Limits ==========

    pub fn line_limits(&self) -> LineLimits {
        LineLimits::new(self.max_lines, self.max_chars_per_line)
    }

    pub fn set_line_limits(&mut self, max_lines: usize, max_chars_per_line: f64) {
        self.max_lines = max_lines;
        self.max_chars_per_line = max_chars_per_line;
    }

    // ========== Data Files ==========

    pub fn with_bindings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.bindings_path = Some(path.into());
        self
    }

    pub fn with_history_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.history_path = Some(path.into());
        self
    }

    pub fn with_dictionary_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dictionary_path = Some(path.into());
        self
    }
}
