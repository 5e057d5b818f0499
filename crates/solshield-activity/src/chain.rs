//! Chain verification over persisted lines.
//!
//! A stream file is read back as a sequence of `StoredLine`s, one per
//! non-blank line.  Verification walks them in order and stops at the first
//! break; the reported count still covers every line present in the file.
//!
//! Per-entry checks, in order:
//!   1. the line parses as an `ActivityEntry`
//!   2. `sequence` equals the entry's position in the file
//!   3. `previous_hash` equals the preceding entry's hash (or `"genesis"`)
//!   4. `entry_hash` equals the hash recomputed from the stored fields

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::entry::ActivityEntry;

/// One non-blank line of a stream file.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredLine {
    Entry(ActivityEntry),
    /// The line is not a well-formed entry.
    Malformed {
        /// 1-based line number in the file.
        line_number: usize,
        reason: String,
        /// `entry_hash` if the line is at least a JSON object carrying one.
        entry_hash: Option<String>,
    },
}

impl StoredLine {
    /// Parse one raw line from the stream file.
    pub fn parse(line_number: usize, raw: &str) -> Self {
        match serde_json::from_str::<ActivityEntry>(raw) {
            Ok(entry) => StoredLine::Entry(entry),
            Err(e) => {
                let entry_hash = serde_json::from_str::<serde_json::Value>(raw)
                    .ok()
                    .and_then(|v| v.get("entry_hash")?.as_str().map(str::to_string));
                StoredLine::Malformed {
                    line_number,
                    reason: e.to_string(),
                    entry_hash,
                }
            }
        }
    }

    pub fn entry(&self) -> Option<&ActivityEntry> {
        match self {
            StoredLine::Entry(entry) => Some(entry),
            StoredLine::Malformed { .. } => None,
        }
    }

    /// The hash this line claims for itself, if any.
    pub fn claimed_hash(&self) -> Option<&str> {
        match self {
            StoredLine::Entry(entry) => Some(&entry.entry_hash),
            StoredLine::Malformed { entry_hash, .. } => entry_hash.as_deref(),
        }
    }
}

/// Why verification stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakKind {
    Malformed { reason: String },
    SequenceMismatch { expected: u64, found: u64 },
    LinkMismatch { expected: String, found: String },
    HashMismatch { stored: String, recomputed: String },
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakKind::Malformed { reason } => write!(f, "malformed line: {}", reason),
            BreakKind::SequenceMismatch { expected, found } => {
                write!(f, "sequence {} found where {} was expected", found, expected)
            }
            BreakKind::LinkMismatch { expected, found } => {
                write!(f, "previous_hash {} does not link to {}", found, expected)
            }
            BreakKind::HashMismatch { stored, recomputed } => {
                write!(f, "stored hash {} but content hashes to {}", stored, recomputed)
            }
        }
    }
}

/// The first integrity break found in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// Zero-based position of the offending entry.
    pub position: usize,
    /// 1-based line number in the file.
    pub line_number: usize,
    #[serde(flatten)]
    pub kind: BreakKind,
}

/// Outcome of verifying a whole stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub valid: bool,
    /// Every entry physically present, including any after a break.
    pub entries: usize,
    pub first_break: Option<ChainBreak>,
}

impl IntegrityReport {
    /// The `(valid, count)` pair.
    pub fn as_tuple(&self) -> (bool, usize) {
        (self.valid, self.entries)
    }
}

/// Verify stored lines paired with their 1-based file line numbers.
pub fn verify_lines(lines: &[(usize, StoredLine)]) -> IntegrityReport {
    let mut expected_prev = ActivityEntry::GENESIS_HASH.to_string();
    let mut first_break = None;

    for (position, (line_number, line)) in lines.iter().enumerate() {
        let checked = match line {
            StoredLine::Entry(entry) => check_entry(position, entry, &expected_prev),
            StoredLine::Malformed { reason, .. } => Err(BreakKind::Malformed {
                reason: reason.clone(),
            }),
        };
        match checked {
            Ok(hash) => expected_prev = hash,
            Err(kind) => {
                warn!(position, line_number, reason = %kind, "activity chain integrity break");
                first_break = Some(ChainBreak {
                    position,
                    line_number: *line_number,
                    kind,
                });
                break;
            }
        }
    }

    IntegrityReport {
        valid: first_break.is_none(),
        entries: lines.len(),
        first_break,
    }
}

/// Verify an in-memory slice of entries.  An empty chain is valid.
pub fn verify_chain(entries: &[ActivityEntry]) -> bool {
    let mut expected_prev = ActivityEntry::GENESIS_HASH.to_string();
    for (position, entry) in entries.iter().enumerate() {
        match check_entry(position, entry, &expected_prev) {
            Ok(hash) => expected_prev = hash,
            Err(_) => return false,
        }
    }
    true
}

/// Returns the verified hash of `entry` on success.
fn check_entry(
    position: usize,
    entry: &ActivityEntry,
    expected_prev: &str,
) -> Result<String, BreakKind> {
    if entry.sequence != position as u64 {
        return Err(BreakKind::SequenceMismatch {
            expected: position as u64,
            found: entry.sequence,
        });
    }

    if entry.previous_hash != expected_prev {
        return Err(BreakKind::LinkMismatch {
            expected: expected_prev.to_string(),
            found: entry.previous_hash.clone(),
        });
    }

    let recomputed = entry.compute_hash();
    if entry.entry_hash != recomputed {
        return Err(BreakKind::HashMismatch {
            stored: entry.entry_hash.clone(),
            recomputed,
        });
    }

    Ok(recomputed)
}
