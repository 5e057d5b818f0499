//! # solshield-activity
//!
//! Tamper-evident, append-only, SHA-256 hash-chained activity log for
//! SolShield agents.
//!
//! ## Overview
//!
//! Every action an agent takes is recorded as an `ActivityEntry` whose hash
//! commits to its content and to the hash of the entry before it.  Entries
//! are stored one JSON object per line in `<stream>_activity.jsonl`.  Editing,
//! reordering or deleting a stored line breaks the chain, which
//! `ActivityLog::verify_integrity` reports as `(false, count)`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use serde_json::json;
//! use solshield_activity::ActivityLog;
//!
//! let log = ActivityLog::open("agent/logs", "demo")?;
//! log.append("position_discovered", json!({ "protocol": "kamino", "health_factor": 1.08 }))?;
//!
//! let (valid, count) = log.verify_integrity()?;
//! let summary = log.summary()?;
//! ```

pub mod canonical;
pub mod chain;
pub mod entry;
pub mod log;
pub mod summary;

pub use chain::{verify_chain, BreakKind, ChainBreak, IntegrityReport, StoredLine};
pub use entry::{ActivityEntry, Details};
pub use log::{ActivityLog, ChainTip};
pub use summary::ActivitySummary;

// ── Tests ─────────────────────────────────────────────────────────────────────
