//! Error types for the SolShield activity log.
//!
//! Every fallible operation returns `ActivityResult<T>`.  Only storage and
//! input problems are errors: a malformed persisted line or a broken hash
//! link is reported through the verification result instead.

use std::path::PathBuf;

use thiserror::Error;

/// The unified error type for the activity log crates.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The log directory or stream file could not be created, opened, read,
    /// written or synced.
    ///
    /// Fatal to the triggering call: a log whose writes silently fail is no log.
    #[error("storage error at '{}': {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stream name cannot be mapped onto a single file in the log directory.
    #[error("invalid stream name '{name}': {reason}")]
    InvalidStream { name: String, reason: String },

    /// The details payload is not a JSON object.
    #[error("invalid details payload: {reason}")]
    InvalidDetails { reason: String },

    /// An entry could not be rendered into its persisted JSON line.
    #[error("entry serialization failed: {reason}")]
    Serialization { reason: String },

    /// The append critical section could not be entered.
    #[error("append failed: {reason}")]
    AppendFailed { reason: String },

    /// A configuration file is missing or does not match `LogConfig`.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl ActivityError {
    /// Wrap an I/O failure together with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the SolShield crates.
pub type ActivityResult<T> = Result<T, ActivityError>;
