//! Delta sinks: the local log file and the remote endpoint

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::snapshot::Delta;
use crate::types::Identity;
use crate::{Result, SyncError};

/// Wire and record form of a delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub username: String,
    pub profile: String,
    pub data: Delta,
}

impl Submission {
    pub fn new(identity: &Identity, data: Delta) -> Self {
        Self {
            username: identity.username.clone(),
            profile: identity.profile.name().to_string(),
            data,
        }
    }
}

/// Append-only per-account log files
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log file for an account
    pub fn path_for(&self, account_hash: i64) -> PathBuf {
        self.dir.join(format!("datalog-{}.txt", account_hash))
    }

    /// Append one `<timestamp> - <json>` line for the submission
    pub async fn append(&self, account_hash: i64, submission: &Submission) -> Result<PathBuf> {
        let path = self.path_for(account_hash);
        let line = format_record(submission)?;

        self.write_line(&path, &line)
            .await
            .map_err(|source| SyncError::FileWrite {
                path: path.display().to_string(),
                source,
            })?;

        Ok(path)
    }

    async fn write_line(&self, path: &Path, line: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// One log line, newline included
pub fn format_record(submission: &Submission) -> Result<String> {
    let timestamp = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.f");
    let json = serde_json::to_string(submission)?;
    Ok(format!("{} - {}\n", timestamp, json))
}

/// Remote acknowledgement of a delta
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Deliver the submission; `Ok` only once the endpoint accepted it
    async fn submit(&self, endpoint: &str, submission: &Submission, timeout: Duration) -> Result<()>;
}

/// JSON POST over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpSubmitter {
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSink for HttpSubmitter {
    async fn submit(&self, endpoint: &str, submission: &Submission, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .json(submission)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::SubmissionTimeout(timeout)
                } else {
                    SyncError::SubmissionTransport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SubmissionStatus(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProfileType;

    fn submission() -> Submission {
        let mut delta = Delta::new();
        delta.varp.insert(101, 3);
        Submission::new(&Identity::new("Framed", ProfileType::Deadman), delta)
    }

    #[test]
    fn test_submission_wire_format() {
        let json = serde_json::to_value(submission()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "username": "Framed",
                "profile": "DEADMAN",
                "data": {"varb": {}, "varp": {"101": 3}, "level": {}}
            })
        );
    }

    #[test]
    fn test_record_line_format() {
        let line = format_record(&submission()).unwrap();
        let (timestamp, json) = line.trim_end().split_once(" - ").unwrap();

        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f").is_ok());
        let parsed: Submission = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, submission());
        assert!(line.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("logs"));

        let path = sink.append(77, &submission()).await.unwrap();
        sink.append(77, &submission()).await.unwrap();

        assert_eq!(path, dir.path().join("logs").join("datalog-77.txt"));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_file_sink_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let sink = FileSink::new(&blocker);
        let err = sink.append(1, &submission()).await.unwrap_err();
        assert!(matches!(err, SyncError::FileWrite { .. }));
    }
}
