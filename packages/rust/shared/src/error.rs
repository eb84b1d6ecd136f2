//! Error types for keypearls.
//!
//! Library crates use [`PearlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PearlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Document parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Pattern library failed to load or compile.
    #[error("lexicon error: {0}")]
    Lexicon(String),

    /// Inter-stage artifact is missing, unreadable, or from the wrong stage.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PearlError>;

impl PearlError {
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
}
