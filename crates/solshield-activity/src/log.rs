//! File-backed, append-only activity log.
//!
//! `ActivityLog` owns one `<stream>_activity.jsonl` file.  On open it replays
//! the file to recover the chain tip; every append writes exactly one line,
//! syncs it, and only then advances the tip.  Verification and summaries
//! re-read the file from disk, so edits made by another process since open
//! are caught too.
//!
//! The tip and the append handle share one `Mutex`: concurrent `append`
//! calls through `&self` are serialized, keeping sequences contiguous.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use solshield_contracts::{
    config::{stream_file_path, LogConfig},
    error::{ActivityError, ActivityResult},
};

use crate::{
    chain::{verify_lines, IntegrityReport, StoredLine},
    entry::{now_timestamp, ActivityEntry, Details},
    summary::ActivitySummary,
};

/// A stored line together with its 1-based line number in the file.
pub type NumberedLine = (usize, StoredLine);

/// The `(sequence, last_hash)` pair describing the end of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    /// Number of entries written so far; the next entry's sequence.
    pub sequence: u64,
    /// `entry_hash` of the newest entry, or `"genesis"`.
    pub last_hash: String,
}

impl ChainTip {
    pub fn genesis() -> Self {
        Self {
            sequence: 0,
            last_hash: ActivityEntry::GENESIS_HASH.to_string(),
        }
    }
}

struct LogState {
    tip: ChainTip,
    file: File,
    /// The file's last byte is not `\n` (a crash-cut or hand-edited tail);
    /// the next append starts with a newline so it lands on its own line.
    needs_newline: bool,
}

/// An append-only, hash-chained activity stream stored on disk.
///
/// Construct one per stream and pass it to whoever records activity; wrap it
/// in an `Arc` to share it between threads.
pub struct ActivityLog {
    stream: String,
    path: PathBuf,
    state: Mutex<LogState>,
}

impl ActivityLog {
    /// Open (or create) the stream `stream` under `dir`.
    ///
    /// Creates `dir` if needed, replays any existing entries to recover the
    /// chain tip and positions appends at the end of the file.  The chain is
    /// not verified here; call `verify_integrity` for that.
    pub fn open(dir: impl AsRef<Path>, stream: &str) -> ActivityResult<Self> {
        let dir = dir.as_ref();
        validate_stream_name(stream)?;

        fs::create_dir_all(dir).map_err(|e| ActivityError::storage(dir, e))?;
        let path = stream_file_path(dir, stream);

        let lines = read_stored_lines(&path)?;
        let tip = replay_tip(&lines);
        let needs_newline = lacks_trailing_newline(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ActivityError::storage(&path, e))?;

        info!(
            stream = %stream,
            path = %path.display(),
            sequence = tip.sequence,
            last_hash = %tip.last_hash,
            needs_newline,
            "activity log opened"
        );

        Ok(Self {
            stream: stream.to_string(),
            path,
            state: Mutex::new(LogState {
                tip,
                file,
                needs_newline,
            }),
        })
    }

    /// Open the stream described by `config`.
    pub fn open_with(config: &LogConfig) -> ActivityResult<Self> {
        Self::open(&config.log_dir, &config.stream)
    }

    /// Record one action.
    ///
    /// `details` must be a JSON object (`null` is taken as an empty one).
    /// The new entry links to the current tip, is written as a single line
    /// and synced to disk; the tip moves only after that succeeds.  On a
    /// storage error the file is cut back to its previous length and the tip
    /// is re-derived from disk, so a failed call never leaves a half line.
    pub fn append(
        &self,
        action: impl Into<String>,
        details: impl Into<Value>,
    ) -> ActivityResult<ActivityEntry> {
        let details = into_details(details.into())?;
        let action = action.into();

        let mut state = self.state.lock().map_err(|e| ActivityError::AppendFailed {
            reason: format!("activity log lock poisoned: {}", e),
        })?;

        let entry = ActivityEntry::new(
            now_timestamp(),
            action,
            details,
            state.tip.last_hash.clone(),
            state.tip.sequence,
        );

        let json = serde_json::to_string(&entry.to_representation()).map_err(|e| {
            ActivityError::Serialization {
                reason: e.to_string(),
            }
        })?;
        let mut line = String::with_capacity(json.len() + 2);
        if state.needs_newline {
            line.push('\n');
        }
        line.push_str(&json);
        line.push('\n');

        let len_before = state
            .file
            .metadata()
            .map_err(|e| ActivityError::storage(&self.path, e))?
            .len();

        let written = state
            .file
            .write_all(line.as_bytes())
            .and_then(|()| state.file.sync_data());
        if let Err(e) = written {
            self.roll_back(&mut state, len_before);
            return Err(ActivityError::storage(&self.path, e));
        }

        state.tip.sequence += 1;
        state.tip.last_hash = entry.entry_hash.clone();
        state.needs_newline = false;

        debug!(
            stream = %self.stream,
            sequence = entry.sequence,
            action = %entry.action,
            entry_hash = %entry.entry_hash,
            "activity recorded"
        );

        Ok(entry)
    }

    /// Re-read the stream file and verify the whole chain.
    ///
    /// Returns `(valid, count)`; `count` covers every entry in the file even
    /// when an earlier one is broken.
    pub fn verify_integrity(&self) -> ActivityResult<(bool, usize)> {
        Ok(self.verify_report()?.as_tuple())
    }

    /// Like `verify_integrity`, but also says where and why the chain broke.
    pub fn verify_report(&self) -> ActivityResult<IntegrityReport> {
        let lines = read_stored_lines(&self.path)?;
        Ok(verify_lines(&lines))
    }

    /// Entry count, per-action counts, a fresh integrity check and the tip hash.
    pub fn summary(&self) -> ActivityResult<ActivitySummary> {
        let lines = read_stored_lines(&self.path)?;
        let report = verify_lines(&lines);
        let summary = ActivitySummary::from_lines(
            &self.stream,
            &lines,
            report.valid,
            self.last_hash(),
        );

        info!(
            stream = %self.stream,
            total_entries = summary.total_entries,
            integrity_valid = summary.integrity_valid,
            "activity summary computed"
        );

        Ok(summary)
    }

    /// Every non-blank line currently in the stream file.
    pub fn read_lines(&self) -> ActivityResult<Vec<NumberedLine>> {
        read_stored_lines(&self.path)
    }

    /// The well-formed entries currently in the stream file, in order.
    pub fn entries(&self) -> ActivityResult<Vec<ActivityEntry>> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|(_, line)| match line {
                StoredLine::Entry(entry) => Some(entry),
                StoredLine::Malformed { .. } => None,
            })
            .collect())
    }

    pub fn tip(&self) -> ChainTip {
        self.lock_state().tip.clone()
    }

    /// Number of entries written so far.
    pub fn sequence(&self) -> u64 {
        self.lock_state().tip.sequence
    }

    pub fn last_hash(&self) -> String {
        self.lock_state().tip.last_hash.clone()
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Undo a failed append: truncate to `len` and resync the tip with
    /// whatever the file now holds.
    fn roll_back(&self, state: &mut LogState, len: u64) {
        if let Err(e) = state.file.set_len(len) {
            warn!(path = %self.path.display(), error = %e, "could not truncate after failed append");
        }

        match read_stored_lines(&self.path).and_then(|lines| {
            Ok((replay_tip(&lines), lacks_trailing_newline(&self.path)?))
        }) {
            Ok((tip, needs_newline)) => {
                state.tip = tip;
                state.needs_newline = needs_newline;
            }
            Err(e) => {
                // Unreadable file: assume a torn tail so the next line starts clean.
                warn!(error = %e, "could not re-read activity log after failed append");
                state.needs_newline = true;
            }
        }
    }

    // A poisoned lock still holds a consistent tip: it only advances after a
    // successful write.
    fn lock_state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("stream", &self.stream)
            .field("path", &self.path)
            .field("tip", &self.tip())
            .finish()
    }
}

/// Reject stream names that would not map onto a single file in the log
/// directory.
pub fn validate_stream_name(name: &str) -> ActivityResult<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name == "." || name == ".." {
        Some("must not be a relative path component")
    } else if name.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if name.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ActivityError::InvalidStream {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn into_details(value: Value) -> ActivityResult<Details> {
    let kind = match value {
        Value::Object(map) => return Ok(map),
        Value::Null => return Ok(Details::new()),
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(ActivityError::InvalidDetails {
        reason: format!("expected a JSON object, got {}", kind),
    })
}

/// Read every non-blank line of `path`.  A missing file reads as empty.
fn read_stored_lines(path: &Path) -> ActivityResult<Vec<NumberedLine>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ActivityError::storage(path, e)),
    };

    let mut lines = Vec::new();
    for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw.map_err(|e| ActivityError::storage(path, e))?;
        let line_number = idx + 1;

        let stored = match std::str::from_utf8(&raw) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => StoredLine::parse(line_number, text),
            Err(e) => StoredLine::Malformed {
                line_number,
                reason: format!("line is not valid UTF-8: {}", e),
                entry_hash: None,
            },
        };
        lines.push((line_number, stored));
    }

    Ok(lines)
}

/// Whether `path` is non-empty and its last byte is not `\n`.
fn lacks_trailing_newline(path: &Path) -> ActivityResult<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ActivityError::storage(path, e)),
    };

    let len = file
        .metadata()
        .map_err(|e| ActivityError::storage(path, e))?
        .len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| ActivityError::storage(path, e))?;
    Ok(last[0] != b'\n')
}

/// Recover the chain tip from stored lines without verifying them.
fn replay_tip(lines: &[NumberedLine]) -> ChainTip {
    for (line_number, line) in lines {
        if let StoredLine::Malformed { reason, .. } = line {
            warn!(line_number, reason = %reason, "malformed activity line during replay");
        }
    }

    let Some((line_number, last)) = lines.last() else {
        return ChainTip::genesis();
    };

    let last_hash = match last.claimed_hash() {
        Some(hash) => hash.to_string(),
        None => {
            warn!(
                line_number,
                "last activity line carries no entry_hash; resuming from last well-formed entry"
            );
            lines
                .iter()
                .rev()
                .find_map(|(_, line)| line.entry().map(|e| e.entry_hash.clone()))
                .unwrap_or_else(|| ActivityEntry::GENESIS_HASH.to_string())
        }
    };

    ChainTip {
        sequence: lines.len() as u64,
        last_hash,
    }
}
