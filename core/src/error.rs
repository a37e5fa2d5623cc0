//! Error type shared by the loaders in softkey-core.
//!
//! Every failure the core can hit is recoverable from the host's point of
//! view: a broken binding file falls back to the packaged default, a missing
//! dictionary or history becomes an empty source. The variants still keep the
//! distinction so callers can decide what to surface to the user.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed binding definition {}: {source}", path.display())]
    BindingFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("packaged default binding definition is unusable: {0}")]
    PackagedDefault(#[source] serde_json::Error),

    #[error("malformed dictionary {}: {reason}", path.display())]
    DictionaryFormat { path: PathBuf, reason: String },

    #[error("failed to build dictionary index: {0}")]
    DictionaryIndex(#[from] fst::Error),

    #[error("failed to parse TOML config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is a corrupt data file that the caller may back up
    /// and replace with a known-good default.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BindingFormat { .. } | Error::DictionaryFormat { .. }
        )
    }
}
