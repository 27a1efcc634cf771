//! Error types for the carrier engine.

use thiserror::Error;

/// All possible errors from the carrier engine.
///
/// Lookups never fail: a missing entry is `None`. Errors only come from
/// the persistence path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Backend errors
    #[error("invalid carrier name: {0:?}")]
    InvalidName(String),

    #[error("persistence failed for '{name}': {reason}")]
    Persistence { name: String, reason: String },

    #[error("storage quota exceeded for '{name}': {needed} bytes needed, {available} available")]
    QuotaExceeded {
        name: String,
        needed: usize,
        available: usize,
    },

    // Codec errors
    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    /// Build a persistence error for the named carrier.
    pub(crate) fn persistence(name: &str, reason: impl ToString) -> Self {
        Error::Persistence {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
