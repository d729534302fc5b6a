//! Error types for varsync
//!
//! Every variant is recoverable: a failed tick or manifest refresh is logged
//! and retried on the next scheduled window.

use std::time::Duration;
use thiserror::Error;

/// Varsync error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed {field} entry in local manifest: '{entry}'")]
    ManifestParse { field: &'static str, entry: String },

    #[error("Manifest fetch failed: {0}")]
    ManifestFetch(String),

    #[error("Manifest decode failed: {0}")]
    ManifestDecode(String),

    #[error("Submission transport error: {0}")]
    SubmissionTransport(String),

    #[error("Submission timed out after {0:?}")]
    SubmissionTimeout(Duration),

    #[error("Submission rejected with status {0}")]
    SubmissionStatus(u16),

    #[error("Failed to write log file {path}: {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// True for failures of the remote submission path.
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            SyncError::SubmissionTransport(_)
                | SyncError::SubmissionTimeout(_)
                | SyncError::SubmissionStatus(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::InvalidConfig(e.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(e: toml::ser::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for varsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_failure_classification() {
        assert!(SyncError::SubmissionStatus(500).is_submission_failure());
        assert!(SyncError::SubmissionTimeout(Duration::from_secs(3)).is_submission_failure());
        assert!(!SyncError::ManifestFetch("down".into()).is_submission_failure());
    }

    #[test]
    fn test_parse_error_message() {
        let err = SyncError::ManifestParse {
            field: "varbits",
            entry: "x".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed varbits entry in local manifest: 'x'"
        );
    }
}
