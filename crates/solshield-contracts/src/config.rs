//! Log location configuration.
//!
//! A `LogConfig` names the directory holding the stream files and the stream
//! to open.  It is usually read from a small TOML document:
//!
//! ```toml
//! log_dir = "agent/logs"
//! stream = "demo"
//! ```
//!
//! Both keys are optional and fall back to `LogConfig::default()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ActivityError, ActivityResult};

/// Suffix appended to the stream name to form its file name.
pub const STREAM_FILE_SUFFIX: &str = "_activity.jsonl";

/// Where an activity stream lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Directory holding one `<stream>_activity.jsonl` file per stream.
    pub log_dir: PathBuf,

    /// Stream identifier, usually the agent name.
    pub stream: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("agent/logs"),
            stream: "agent".to_string(),
        }
    }
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>, stream: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            stream: stream.into(),
        }
    }

    /// Parse `s` as TOML.
    ///
    /// Returns `ActivityError::ConfigError` if the TOML is malformed or carries
    /// keys `LogConfig` does not know.
    pub fn from_toml_str(s: &str) -> ActivityResult<Self> {
        toml::from_str(s).map_err(|e| ActivityError::ConfigError {
            reason: format!("failed to parse log config TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> ActivityResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ActivityError::ConfigError {
            reason: format!("failed to read log config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The backing file for `stream` under `log_dir`.
    pub fn stream_path(&self) -> PathBuf {
        stream_file_path(&self.log_dir, &self.stream)
    }
}

/// Deterministic file path for a stream: `<dir>/<stream>_activity.jsonl`.
pub fn stream_file_path(dir: &Path, stream: &str) -> PathBuf {
    dir.join(format!("{}{}", stream, STREAM_FILE_SUFFIX))
}
