//! The activity entry: one logged action plus its place in the hash chain.
//!
//! `ActivityEntry` is created once by `ActivityLog::append` and never
//! mutated afterwards.  Its `entry_hash` commits to every other field, so
//! editing a persisted line breaks either the entry's own hash or the link
//! held by its successor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::canonical::to_canonical_string;

/// Opaque structured payload attached to an entry.
pub type Details = Map<String, Value>;

/// A single entry in the SHA-256 hash chain of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityEntry {
    /// Seconds since the Unix epoch at which the action was recorded.
    pub timestamp: f64,

    /// Short free-form label, e.g. `"position_discovered"`.
    pub action: String,

    /// Arbitrary JSON payload; never interpreted by the log.
    pub details: Details,

    /// SHA-256 hash (hex) of this entry's canonical content.
    pub entry_hash: String,

    /// `entry_hash` of the preceding entry, or `GENESIS_HASH` for sequence 0.
    pub previous_hash: String,

    /// Zero-based position in the stream.
    pub sequence: u64,
}

impl ActivityEntry {
    /// The sentinel `previous_hash` of the first entry in every stream.
    pub const GENESIS_HASH: &'static str = "genesis";

    /// Build an entry and seal it with its computed `entry_hash`.
    pub fn new(
        timestamp: f64,
        action: impl Into<String>,
        details: Details,
        previous_hash: impl Into<String>,
        sequence: u64,
    ) -> Self {
        let mut entry = Self {
            timestamp,
            action: action.into(),
            details,
            entry_hash: String::new(),
            previous_hash: previous_hash.into(),
            sequence,
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Compute the SHA-256 hash of this entry's content.
    ///
    /// The hash input is the canonical JSON of
    /// `{action, details, previous_hash, sequence, timestamp}`; the stored
    /// `entry_hash` is excluded.  Returns a lowercase 64-character hex string.
    pub fn compute_hash(&self) -> String {
        let content = json!({
            "timestamp": self.timestamp,
            "action": self.action,
            "details": self.details,
            "previous_hash": self.previous_hash,
            "sequence": self.sequence,
        });

        let mut hasher = Sha256::new();
        hasher.update(to_canonical_string(&content).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the stored `entry_hash` matches the recomputed one.
    pub fn hash_is_valid(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }

    /// Flat mapping of all six fields, as persisted and as shown to consumers.
    pub fn to_representation(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("timestamp".to_string(), json!(self.timestamp));
        map.insert("action".to_string(), Value::String(self.action.clone()));
        map.insert("details".to_string(), Value::Object(self.details.clone()));
        map.insert(
            "entry_hash".to_string(),
            Value::String(self.entry_hash.clone()),
        );
        map.insert(
            "previous_hash".to_string(),
            Value::String(self.previous_hash.clone()),
        );
        map.insert("sequence".to_string(), json!(self.sequence));
        map
    }

    /// The timestamp as a UTC date-time, if it is representable.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let micros = (self.timestamp * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros)
    }
}

/// Current wall-clock time as fractional seconds since the epoch,
/// truncated to microseconds.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ActivityEntry, Details};

    fn details(value: serde_json::Value) -> Details {
        value.as_object().cloned().unwrap()
    }

    fn sample() -> ActivityEntry {
        ActivityEntry::new(
            1000.0,
            "test",
            details(json!({ "key": "value" })),
            ActivityEntry::GENESIS_HASH,
            0,
        )
    }

    #[test]
    fn hash_is_64_lowercase_hex() {
        let hash = sample().compute_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn hash_is_deterministic() {
        let entry = sample();
        assert_eq!(entry.compute_hash(), entry.compute_hash());
        assert_eq!(entry.entry_hash, entry.compute_hash());
    }

    #[test]
    fn hash_changes_with_action() {
        let a = ActivityEntry::new(1000.0, "test1", Details::new(), "genesis", 0);
        let b = ActivityEntry::new(1000.0, "test2", Details::new(), "genesis", 0);
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn hash_changes_with_each_field() {
        let base = sample();
        let base_hash = base.compute_hash();

        let mut changed = base.clone();
        changed.timestamp = 1000.5;
        assert_ne!(changed.compute_hash(), base_hash, "timestamp");

        let mut changed = base.clone();
        changed.details = details(json!({ "key": "other" }));
        assert_ne!(changed.compute_hash(), base_hash, "details");

        let mut changed = base.clone();
        changed.previous_hash = "0".repeat(64);
        assert_ne!(changed.compute_hash(), base_hash, "previous_hash");

        let mut changed = base.clone();
        changed.sequence = 1;
        assert_ne!(changed.compute_hash(), base_hash, "sequence");
    }

    #[test]
    fn stored_hash_is_not_part_of_hash_input() {
        let mut entry = sample();
        let expected = entry.compute_hash();
        entry.entry_hash = "abc".to_string();
        assert_eq!(entry.compute_hash(), expected);
        assert!(!entry.hash_is_valid());
    }

    /// Nested maps built in different key orders, with integer and float
    /// leaves, must hash identically.
    #[test]
    fn hash_is_independent_of_details_key_order() {
        let mut inner_a = Details::new();
        inner_a.insert("health_factor".to_string(), json!(1.08));
        inner_a.insert("debt_usd".to_string(), json!(12000));
        let mut outer_a = Details::new();
        outer_a.insert("protocol".to_string(), json!("marginfi"));
        outer_a.insert("position".to_string(), json!(inner_a));
        outer_a.insert("ratios".to_string(), json!([0.5, 1, 2.75]));

        let mut inner_b = Details::new();
        inner_b.insert("debt_usd".to_string(), json!(12000));
        inner_b.insert("health_factor".to_string(), json!(1.08));
        let mut outer_b = Details::new();
        outer_b.insert("ratios".to_string(), json!([0.5, 1, 2.75]));
        outer_b.insert("position".to_string(), json!(inner_b));
        outer_b.insert("protocol".to_string(), json!("marginfi"));

        let a = ActivityEntry::new(1_760_000_000.123456, "ai_analysis", outer_a, "genesis", 0);
        let b = ActivityEntry::new(1_760_000_000.123456, "ai_analysis", outer_b, "genesis", 0);
        assert_eq!(a.entry_hash, b.entry_hash);
    }

    #[test]
    fn hash_survives_json_round_trip() {
        let entry = ActivityEntry::new(
            1_760_000_123.654321,
            "rebalance_executed",
            details(json!({
                "amount_usd": 4321.17,
                "dry_run": true,
                "legs": [{ "mint": "SOL", "qty": 12.5 }, { "mint": "USDC", "qty": 1000 }],
            })),
            "f".repeat(64),
            7,
        );

        let line = serde_json::to_string(&entry.to_representation()).unwrap();
        let parsed: ActivityEntry = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed, entry);
        assert!(parsed.hash_is_valid());
    }

    #[test]
    fn representation_has_all_fields() {
        let mut entry = ActivityEntry::new(1000.0, "test", details(json!({ "x": 1 })), "genesis", 0);
        entry.entry_hash = "abc".to_string();

        let repr = entry.to_representation();
        assert_eq!(repr.len(), 6);
        assert_eq!(repr["action"], json!("test"));
        assert_eq!(repr["entry_hash"], json!("abc"));
        assert_eq!(repr["previous_hash"], json!("genesis"));
        assert_eq!(repr["sequence"], json!(0));
        assert_eq!(repr["timestamp"], json!(1000.0));
        assert_eq!(repr["details"], json!({ "x": 1 }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let line = r#"{"timestamp":1.0,"action":"a","details":{},"entry_hash":"x","previous_hash":"genesis","sequence":0,"extra":1}"#;
        assert!(serde_json::from_str::<ActivityEntry>(line).is_err());
    }

    #[test]
    fn recorded_at_converts_timestamp() {
        let entry = ActivityEntry::new(1_700_000_000.25, "a", Details::new(), "genesis", 0);
        let at = entry.recorded_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn now_timestamp_is_recent() {
        let ts = super::now_timestamp();
        assert!(ts > 1_600_000_000.0);
    }
}
