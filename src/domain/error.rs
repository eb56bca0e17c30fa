//! Domain-level error types for logtally.
//!
//! All errors are typed with `thiserror`. A missing candidate file is not an
//! error anywhere in the crate; it is simply skipped.

use std::path::PathBuf;
use thiserror::Error;

use super::position::FileIdentity;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// A resume token's identity matches no file in the file set.
    #[error("Position not found: no file in the set has identity {identity}")]
    PositionNotFound { identity: FileIdentity },

    /// The persisted state file exists but does not parse.
    #[error("Corrupt state file {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A classifier pattern failed to compile.
    #[error("Invalid pattern for counter '{counter}': {message}")]
    Pattern {
        counter: String,
        message: String,
        #[source]
        source: Option<regex::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a pattern error from a regex compile failure.
    pub fn pattern(counter: impl Into<String>, err: regex::Error) -> Self {
        Self::Pattern {
            counter: counter.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a corrupt-state error.
    pub fn corrupt_state(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this is a `PositionNotFound` error, which callers recover from.
    #[must_use]
    pub const fn is_position_not_found(&self) -> bool {
        matches!(self, Self::PositionNotFound { .. })
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
