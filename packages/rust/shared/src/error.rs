//! Error types for Agenda.
//!
//! Library crates use [`AgendaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Agenda operations.
#[derive(Debug, thiserror::Error)]
pub enum AgendaError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while an adapter fetches a source.
    #[error("network error: {0}")]
    Network(String),

    /// Source payload could not be parsed (HTML, JSON feed, selectors).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A single store operation was rejected.
    #[error("storage error: {0}")]
    Storage(String),

    /// The store cannot be reached or did not acknowledge in time.
    /// Fatal for the run.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown category label, duplicate source, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AgendaError>;

impl AgendaError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
