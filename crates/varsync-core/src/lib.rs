//! Varsync Core - snapshot, diff and reconcile engine for tracked player state
//!
//! Varsync periodically samples a manifest of numeric client values for the
//! logged-in player, computes the delta against the last acknowledged
//! baseline, and records it locally and/or submits it to a remote endpoint.
//! A delta only becomes part of the baseline once a sink has confirmed it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        DataSync                          │
//! │   sampling timer (10s)          manifest timer (1200s)   │
//! └─────────┬──────────────────────────────────┬─────────────┘
//!           │                                  │
//! ┌─────────▼──────────┐             ┌─────────▼──────────┐
//! │     Reconciler     │◄────────────┤   ManifestHandle   │
//! │ collect/diff/merge │             │ Local | Remote     │
//! └──┬──────┬───────┬──┘             └────────────────────┘
//!    │      │       │
//! ┌──▼───┐ ┌▼─────┐ ┌▼────────────────────┐
//! │Value │ │Base- │ │ Sinks               │
//! │Source│ │lines │ │ FileSink │ Remote   │
//! └──────┘ └──────┘ └─────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use varsync_core::{DataSync, StaticValueSource, SyncConfig};
//!
//! # async fn example() -> varsync_core::Result<()> {
//! let config = SyncConfig::default().with_local_manifest("", "101");
//! let sync = DataSync::new(config, Arc::new(StaticValueSource::new()))?;
//! sync.start().await;
//! let report = sync.sample().await;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod config;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod reconciler;
pub mod service;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod types;

pub use baseline::BaselineStore;
pub use config::{ManifestSource, MergePolicy, SyncConfig, WriteDestination};
pub use diff::{diff, diff_with, merge, DiffMode};
pub use error::{Result, SyncError};
pub use manifest::{Manifest, ManifestHandle, ManifestProvider};
pub use reconciler::{Reconciler, SkipReason, TickOutcome, TickReport};
pub use service::DataSync;
pub use sink::{FileSink, HttpSubmitter, RemoteSink, Submission};
pub use snapshot::{build_snapshot, Delta, Snapshot};
pub use source::{Skill, StaticValueSource, ValueSource, VarbitComposition};
pub use types::{Identity, PlayerSession, ProfileType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sampling period in seconds
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 10;

/// Default manifest refresh period in seconds
pub const DEFAULT_MANIFEST_REFRESH_SECS: u64 = 1200;

/// Default remote submission timeout in seconds
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 3;
