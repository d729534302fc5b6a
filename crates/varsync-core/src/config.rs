//! Sync configuration
//!
//! A `SyncConfig` is an immutable value: hosts build a new one on every
//! configuration change and hand it to [`crate::service::DataSync::apply_config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diff::DiffMode;
use crate::{Result, SyncError};

/// Where deltas are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDestination {
    /// Append to the local log file only
    File,
    /// Submit to the remote endpoint only
    Server,
    /// Both of the above
    Both,
}

impl WriteDestination {
    pub fn writes_file(self) -> bool {
        matches!(self, WriteDestination::File | WriteDestination::Both)
    }

    pub fn writes_server(self) -> bool {
        matches!(self, WriteDestination::Server | WriteDestination::Both)
    }
}

/// Where the manifest comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    /// Parse the comma-separated lists in this config
    Local,
    /// Fetch the descriptor from `manifest_url`
    Server,
}

/// When a delta is folded into the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Merge only once a sink confirmed the delta: a 2xx response when the
    /// remote is attempted, a successful write when only the file is.
    Acknowledged,
    /// Merge as soon as any sink is attempted, whatever the outcome.
    Eager,
}

/// Main sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Write destination mode
    pub write_destination: WriteDestination,

    /// Manifest source
    pub manifest_source: ManifestSource,

    /// Manifest descriptor URL (server source)
    pub manifest_url: String,

    /// Submission URL; empty disables remote submission
    pub submit_url: String,

    /// Comma separated varbit ids (local source)
    pub manifest_varbits: String,

    /// Comma separated varp ids (local source)
    pub manifest_varps: String,

    /// Directory for per-account log files
    pub log_dir: PathBuf,

    /// Sampling period in seconds
    pub sample_interval_secs: u64,

    /// Manifest refresh period in seconds
    pub manifest_refresh_secs: u64,

    /// Remote submission timeout in seconds
    pub submit_timeout_secs: u64,

    /// Delta computation semantics
    pub diff_mode: DiffMode,

    /// Baseline merge policy
    pub merge_policy: MergePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_destination: WriteDestination::File,
            manifest_source: ManifestSource::Local,
            manifest_url: String::new(),
            submit_url: String::new(),
            manifest_varbits: String::new(),
            manifest_varps: "101".to_string(),
            log_dir: default_log_dir(),
            sample_interval_secs: crate::DEFAULT_SAMPLE_INTERVAL_SECS,
            manifest_refresh_secs: crate::DEFAULT_MANIFEST_REFRESH_SECS,
            submit_timeout_secs: crate::DEFAULT_SUBMIT_TIMEOUT_SECS,
            diff_mode: DiffMode::PresenceSubtraction,
            merge_policy: MergePolicy::Acknowledged,
        }
    }
}

fn default_log_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".varsync")
}

impl SyncConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_destination(mut self, destination: WriteDestination) -> Self {
        self.write_destination = destination;
        self
    }

    pub fn with_manifest_source(mut self, source: ManifestSource) -> Self {
        self.manifest_source = source;
        self
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_submit_url(mut self, url: impl Into<String>) -> Self {
        self.submit_url = url.into();
        self
    }

    /// Set the local manifest lists
    pub fn with_local_manifest(
        mut self,
        varbits: impl Into<String>,
        varps: impl Into<String>,
    ) -> Self {
        self.manifest_varbits = varbits.into();
        self.manifest_varps = varps.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_submit_timeout_secs(mut self, secs: u64) -> Self {
        self.submit_timeout_secs = secs;
        self
    }

    pub fn with_diff_mode(mut self, mode: DiffMode) -> Self {
        self.diff_mode = mode;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// True when a remote submission would be attempted
    pub fn remote_enabled(&self) -> bool {
        self.write_destination.writes_server() && !self.submit_url.trim().is_empty()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn manifest_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.manifest_refresh_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sample_interval_secs must be positive".to_string(),
            ));
        }
        if self.manifest_refresh_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "manifest_refresh_secs must be positive".to_string(),
            ));
        }
        if self.submit_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "submit_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a file. `.toml` files are parsed as TOML,
    /// anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("toml")
}
