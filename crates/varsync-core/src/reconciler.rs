//! Reconciler: snapshot, diff, persist, submit, merge
//!
//! One call to [`Reconciler::tick`] runs a single attempt for the logged-in
//! identity:
//!
//! ```text
//! COLLECT -> DIFF -> (empty: done) -> PERSIST_LOCAL? -> SUBMIT_REMOTE? -> MERGE
//! ```
//!
//! The identity's baseline lock is taken before the diff and released only
//! after the merge decision. When a remote submission is made, the lock moves
//! into the spawned submission task, so the merge always happens before the
//! next diff for that identity and at most one delta per identity is in
//! flight. Failed attempts leave the baseline untouched; the next tick
//! recomputes a delta that includes everything not yet merged.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::baseline::BaselineStore;
use crate::config::{MergePolicy, SyncConfig};
use crate::diff::{diff_with, merge};
use crate::manifest::ManifestHandle;
use crate::sink::{FileSink, HttpSubmitter, RemoteSink, Submission};
use crate::snapshot::build_snapshot;
use crate::source::ValueSource;
use crate::types::Identity;
use crate::{Result, SyncError};

/// Why a tick did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No manifest has been resolved yet
    NoManifest,
    /// The client is not fully logged in
    NotLoggedIn,
    /// A previous submission for this identity has not finished
    SubmissionInFlight,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// The snapshot matched the baseline
    Unchanged,
    /// The delta was merged during the tick
    Merged { entries: usize },
    /// The delta was kept out of the baseline and will be retried
    Retained { entries: usize },
    /// A remote submission is in flight; `merged` tells whether the delta
    /// was already merged eagerly
    Dispatched { entries: usize, merged: bool },
}

/// What a tick did, plus the pending submission if one was spawned
#[derive(Debug)]
pub struct TickReport {
    pub identity: Option<Identity>,
    pub outcome: TickOutcome,
    /// Log file written this tick
    pub log_file: Option<PathBuf>,
    /// Completes once the remote submission and its merge have finished
    pub pending: Option<JoinHandle<Result<()>>>,
}

impl TickReport {
    fn new(identity: Option<Identity>, outcome: TickOutcome) -> Self {
        Self {
            identity,
            outcome,
            log_file: None,
            pending: None,
        }
    }

    /// Wait for the pending submission, if any. Returns `None` when nothing
    /// was dispatched.
    pub async fn settle(&mut self) -> Option<Result<()>> {
        let handle = self.pending.take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => Some(Err(SyncError::SubmissionTransport(format!(
                "submission task failed: {}",
                e
            )))),
        }
    }
}

/// Owns the baselines and drives reconciliation ticks
pub struct Reconciler {
    config: RwLock<Arc<SyncConfig>>,
    manifest: ManifestHandle,
    baselines: Arc<BaselineStore>,
    remote: Arc<dyn RemoteSink>,
}

impl Reconciler {
    pub fn new(config: SyncConfig, manifest: ManifestHandle, remote: Arc<dyn RemoteSink>) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            manifest,
            baselines: Arc::new(BaselineStore::new()),
            remote,
        }
    }

    /// Reconciler submitting over HTTP with the given client
    pub fn with_http(config: SyncConfig, manifest: ManifestHandle, client: reqwest::Client) -> Self {
        Self::new(config, manifest, Arc::new(HttpSubmitter::new(client)))
    }

    /// Configuration in effect
    pub fn config(&self) -> Arc<SyncConfig> {
        self.config.read().clone()
    }

    /// Swap in a new configuration; takes effect on the next tick
    pub fn set_config(&self, config: SyncConfig) {
        *self.config.write() = Arc::new(config);
    }

    pub fn manifest(&self) -> &ManifestHandle {
        &self.manifest
    }

    pub fn baselines(&self) -> &Arc<BaselineStore> {
        &self.baselines
    }

    /// Run one reconciliation attempt for the logged-in identity
    pub async fn tick(&self, source: &dyn ValueSource) -> TickReport {
        let config = self.config();

        let Some(manifest) = self.manifest.current() else {
            tracing::debug!("Tick skipped: no manifest");
            return TickReport::new(None, TickOutcome::Skipped(SkipReason::NoManifest));
        };
        let Some(session) = source.active_session() else {
            tracing::debug!("Tick skipped: not logged in");
            return TickReport::new(None, TickOutcome::Skipped(SkipReason::NotLoggedIn));
        };
        let identity = session.identity.clone();

        let Some(mut baseline) = self.baselines.try_lock(&identity) else {
            tracing::debug!("Tick skipped: submission in flight for {}", identity);
            return TickReport::new(
                Some(identity),
                TickOutcome::Skipped(SkipReason::SubmissionInFlight),
            );
        };

        let snapshot = build_snapshot(source, &manifest);
        let delta = diff_with(config.diff_mode, &snapshot, &baseline);
        if delta.is_empty() {
            return TickReport::new(Some(identity), TickOutcome::Unchanged);
        }

        let entries = delta.len();
        let submission = Submission::new(&identity, delta);
        let mut report = TickReport::new(Some(identity.clone()), TickOutcome::Unchanged);

        let mut local_written = None;
        if config.write_destination.writes_file() {
            let sink = FileSink::new(&config.log_dir);
            match sink.append(session.account_hash, &submission).await {
                Ok(path) => {
                    tracing::debug!("Recorded {} entries for {} in {}", entries, identity, path.display());
                    report.log_file = Some(path);
                    local_written = Some(true);
                }
                Err(e) => {
                    tracing::warn!("Failed to record delta for {}: {}", identity, e);
                    local_written = Some(false);
                }
            }
        }

        let remote = config.remote_enabled();
        if config.write_destination.writes_server() && !remote {
            tracing::warn!("Server destination selected but no submit url is set");
        }

        let merge_now = match config.merge_policy {
            MergePolicy::Eager => local_written.is_some() || remote,
            MergePolicy::Acknowledged => !remote && local_written == Some(true),
        };
        if merge_now {
            merge(&mut baseline, &submission.data);
            tracing::info!("Merged {} entries into baseline for {}", entries, identity);
        }

        if !remote {
            report.outcome = if merge_now {
                TickOutcome::Merged { entries }
            } else {
                TickOutcome::Retained { entries }
            };
            return report;
        }

        let sink = self.remote.clone();
        let endpoint = config.submit_url.clone();
        let timeout = config.submit_timeout();
        report.outcome = TickOutcome::Dispatched {
            entries,
            merged: merge_now,
        };
        report.pending = Some(tokio::spawn(async move {
            // The baseline guard is held until this deadline at the latest
            let outcome = tokio::time::timeout(timeout, sink.submit(&endpoint, &submission, timeout))
                .await
                .unwrap_or(Err(SyncError::SubmissionTimeout(timeout)));
            match outcome {
                Ok(()) => {
                    merge(&mut baseline, &submission.data);
                    tracing::info!(
                        "Submission acknowledged, merged {} entries for {}",
                        entries,
                        identity
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Failed to submit delta for {}: {}", identity, e);
                    Err(e)
                }
            }
        }));
        report
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config())
            .field("manifest", &self.manifest.current())
            .field("identities", &self.baselines.len())
            .finish()
    }
}
