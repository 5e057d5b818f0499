//! Aggregate view over a stream, as shown by dashboards and the CLI.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::log::NumberedLine;

/// Entry count, per-action breakdown, integrity status and tip hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub stream: String,
    /// Every entry present in the file, well-formed or not.
    pub total_entries: usize,
    /// Occurrences of each `action` label among well-formed entries.
    pub actions: BTreeMap<String, usize>,
    pub integrity_valid: bool,
    /// The log's in-memory chain tip, i.e. the hash the next append links
    /// to.  It is not re-read from the file, so after an out-of-process edit
    /// it can differ from the newest stored line's `entry_hash`.
    pub last_hash: String,
}

impl ActivitySummary {
    pub(crate) fn from_lines(
        stream: &str,
        lines: &[NumberedLine],
        integrity_valid: bool,
        last_hash: String,
    ) -> Self {
        let mut actions = BTreeMap::new();
        for entry in lines.iter().filter_map(|(_, line)| line.entry()) {
            *actions.entry(entry.action.clone()).or_insert(0) += 1;
        }

        Self {
            stream: stream.to_string(),
            total_entries: lines.len(),
            actions,
            integrity_valid,
            last_hash,
        }
    }
}
