//! # solshield-contracts
//!
//! Shared error and configuration types for the SolShield activity log.
//!
//! No business logic lives in this crate, only the error taxonomy and the
//! description of where a stream is stored.

pub mod config;
pub mod error;

pub use config::{stream_file_path, LogConfig, STREAM_FILE_SUFFIX};
pub use error::{ActivityError, ActivityResult};

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use super::*;

    // ── LogConfig ────────────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("agent/logs"));
        assert_eq!(config.stream, "agent");
        assert_eq!(
            config.stream_path(),
            PathBuf::from("agent/logs/agent_activity.jsonl")
        );
    }

    #[test]
    fn config_parses_full_document() {
        let config = LogConfig::from_toml_str(
            r#"
            log_dir = "/var/lib/solshield"
            stream = "rebalancer"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/var/lib/solshield"));
        assert_eq!(config.stream, "rebalancer");
    }

    #[test]
    fn config_missing_keys_fall_back_to_defaults() {
        let config = LogConfig::from_toml_str(r#"stream = "demo""#).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("agent/logs"));
        assert_eq!(config.stream, "demo");

        let empty = LogConfig::from_toml_str("").unwrap();
        assert_eq!(empty, LogConfig::default());
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let err = LogConfig::from_toml_str(r#"log_directory = "x""#).unwrap_err();
        assert!(matches!(err, ActivityError::ConfigError { .. }));
    }

    #[test]
    fn config_rejects_malformed_toml() {
        let err = LogConfig::from_toml_str("stream = ").unwrap_err();
        assert!(err.to_string().contains("failed to parse log config TOML"));
    }

    #[test]
    fn config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_dir = \"logs\"").unwrap();
        writeln!(file, "stream = \"monitor\"").unwrap();

        let config = LogConfig::from_file(file.path()).unwrap();
        assert_eq!(config, LogConfig::new("logs", "monitor"));
    }

    #[test]
    fn config_from_missing_file() {
        let err = LogConfig::from_file(Path::new("/nonexistent/solshield.toml")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("/nonexistent/solshield.toml"));
    }

    #[test]
    fn stream_file_path_is_deterministic() {
        let a = stream_file_path(Path::new("/tmp/logs"), "demo");
        let b = stream_file_path(Path::new("/tmp/logs"), "demo");
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/logs/demo_activity.jsonl"));
    }

    // ── ActivityError display messages ───────────────────────────────────────

    #[test]
    fn error_storage_display() {
        let err = ActivityError::storage(
            "/tmp/logs/demo_activity.jsonl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem"),
        );
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("/tmp/logs/demo_activity.jsonl"));
        assert!(msg.contains("read-only filesystem"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_invalid_stream_display() {
        let err = ActivityError::InvalidStream {
            name: "../escape".to_string(),
            reason: "must not contain path separators".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("../escape"));
        assert!(msg.contains("path separators"));
    }

    #[test]
    fn error_invalid_details_display() {
        let err = ActivityError::InvalidDetails {
            reason: "expected a JSON object, got an array".to_string(),
        };
        assert!(err.to_string().contains("invalid details payload"));
    }

    #[test]
    fn error_append_failed_display() {
        let err = ActivityError::AppendFailed {
            reason: "lock poisoned".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("append failed"));
        assert!(msg.contains("lock poisoned"));
    }

    #[test]
    fn error_serialization_display() {
        let err = ActivityError::Serialization {
            reason: "key must be a string".to_string(),
        };
        assert!(err.to_string().contains("entry serialization failed"));
    }
}
