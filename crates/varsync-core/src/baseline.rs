//! Per-identity baselines
//!
//! Each identity owns an async mutex around its baseline snapshot. A
//! reconciliation holds that lock from diff until merge, so two attempts for
//! the same identity never interleave. The outer map lock is only held to
//! look up or create an entry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::snapshot::Snapshot;
use crate::types::Identity;

/// Lock guarding one identity's baseline
pub type BaselineGuard = OwnedMutexGuard<Snapshot>;

/// In-memory baselines, keyed by identity
#[derive(Debug, Default)]
pub struct BaselineStore {
    entries: Mutex<HashMap<Identity, Arc<AsyncMutex<Snapshot>>>>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The baseline slot for `identity`, created empty on first sight
    pub fn entry(&self, identity: &Identity) -> Arc<AsyncMutex<Snapshot>> {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get(identity) {
            return slot.clone();
        }
        tracing::debug!("New baseline for {}", identity);
        let slot = Arc::new(AsyncMutex::new(Snapshot::new()));
        entries.insert(identity.clone(), slot.clone());
        slot
    }

    /// Wait for exclusive access to `identity`'s baseline
    pub async fn lock(&self, identity: &Identity) -> BaselineGuard {
        self.entry(identity).lock_owned().await
    }

    /// Exclusive access to `identity`'s baseline, or `None` while another
    /// attempt holds it
    pub fn try_lock(&self, identity: &Identity) -> Option<BaselineGuard> {
        self.entry(identity).try_lock_owned().ok()
    }

    /// Copy of the current baseline, waiting for any in-flight attempt
    pub async fn snapshot_of(&self, identity: &Identity) -> Option<Snapshot> {
        let slot = self.entries.lock().get(identity).cloned()?;
        let baseline = slot.lock().await;
        Some(baseline.clone())
    }

    /// Identities seen so far
    pub fn identities(&self) -> Vec<Identity> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget every baseline
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
