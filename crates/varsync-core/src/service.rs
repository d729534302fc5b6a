//! Scheduling host: sampling and manifest refresh timers

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as AsyncMutex, Notify};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::manifest::{provider_for, Manifest, ManifestHandle};
use crate::reconciler::{Reconciler, TickReport};
use crate::sink::RemoteSink;
use crate::source::ValueSource;
use crate::Result;

/// A running sync instance: one value source, one reconciler
pub struct DataSync {
    reconciler: Arc<Reconciler>,
    source: Arc<dyn ValueSource>,
    client: reqwest::Client,
    /// Serializes manifest refreshes so the latest config always lands last
    refresh_lock: AsyncMutex<()>,
    config_changed: Notify,
}

impl DataSync {
    /// Build a sync instance submitting over HTTP
    pub fn new(config: SyncConfig, source: Arc<dyn ValueSource>) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::new();
        let reconciler = Reconciler::with_http(config, ManifestHandle::new(), client.clone());
        Ok(Self::assemble(reconciler, source, client))
    }

    /// Build a sync instance with a custom remote sink
    pub fn with_remote(
        config: SyncConfig,
        source: Arc<dyn ValueSource>,
        remote: Arc<dyn RemoteSink>,
    ) -> Result<Self> {
        config.validate()?;
        let reconciler = Reconciler::new(config, ManifestHandle::new(), remote);
        Ok(Self::assemble(reconciler, source, reqwest::Client::new()))
    }

    fn assemble(reconciler: Reconciler, source: Arc<dyn ValueSource>, client: reqwest::Client) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            source,
            client,
            refresh_lock: AsyncMutex::new(()),
            config_changed: Notify::new(),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Resolve the initial manifest
    pub async fn start(&self) {
        let _ = self.refresh_manifest().await;
    }

    /// Resolve the manifest the configuration points at and swap it in.
    /// A failure is logged and the previous manifest stays in effect.
    pub async fn refresh_manifest(&self) -> Result<Arc<Manifest>> {
        let _serialized = self.refresh_lock.lock().await;
        let config = self.reconciler.config();
        let provider = provider_for(&config, &self.client);
        let result = self.reconciler.manifest().refresh(provider.as_ref()).await;
        if let Err(ref e) = result {
            tracing::warn!("Manifest refresh failed, keeping previous manifest: {}", e);
        }
        result
    }

    /// Install a new configuration and re-resolve the manifest for it.
    ///
    /// A running [`DataSync::run`] loop picks up changed periods right away.
    pub async fn apply_config(&self, config: SyncConfig) -> Result<()> {
        config.validate()?;
        if *self.reconciler.config() == config {
            return Ok(());
        }
        self.reconciler.set_config(config);
        self.config_changed.notify_one();
        tracing::info!("Configuration changed");
        let _ = self.refresh_manifest().await;
        Ok(())
    }

    /// Run one reconciliation tick
    pub async fn sample(&self) -> TickReport {
        self.reconciler.tick(self.source.as_ref()).await
    }

    /// Drive both timers until `shutdown` fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let config = self.reconciler.config();
        let mut sample_period = config.sample_interval();
        let mut refresh_period = config.manifest_refresh_interval();
        let mut sampling = sampling_timer(sample_period);
        let mut refresh = refresh_timer(refresh_period);

        tracing::info!(
            "Sync running: sampling every {}s, manifest refresh every {}s",
            config.sample_interval_secs,
            config.manifest_refresh_secs
        );

        loop {
            tokio::select! {
                _ = sampling.tick() => {
                    let report = self.sample().await;
                    tracing::debug!("Tick outcome: {:?}", report.outcome);
                }
                _ = refresh.tick() => {
                    if self.source.active_session().is_some() {
                        let _ = self.refresh_manifest().await;
                    }
                }
                _ = self.config_changed.notified() => {
                    let config = self.reconciler.config();
                    if config.sample_interval() != sample_period {
                        sample_period = config.sample_interval();
                        sampling = sampling_timer(sample_period);
                        tracing::info!("Sampling every {}s", config.sample_interval_secs);
                    }
                    if config.manifest_refresh_interval() != refresh_period {
                        refresh_period = config.manifest_refresh_interval();
                        refresh = refresh_timer(refresh_period);
                        tracing::info!("Manifest refresh every {}s", config.manifest_refresh_secs);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sync shutting down");
                    break;
                }
            }
        }
    }
}

fn sampling_timer(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

/// First tick one full period from now
fn refresh_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

impl std::fmt::Debug for DataSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSync")
            .field("reconciler", &self.reconciler)
            .finish()
    }
}
