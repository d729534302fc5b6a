//! Manifest: the set of varbits and varps to track
//!
//! A manifest is resolved either from the local configuration lists or from
//! a remote descriptor. The resolved value lives in a [`ManifestHandle`] and
//! is only ever replaced as a whole; a failed resolution keeps the previous
//! manifest in effect.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{ManifestSource, SyncConfig};
use crate::{Result, SyncError};

/// Version reported by manifests that do not carry one
pub const UNVERSIONED: i32 = -1;

/// Tracked field identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "unversioned")]
    pub version: i32,
    pub varbits: Vec<i32>,
    pub varps: Vec<i32>,
}

fn unversioned() -> i32 {
    UNVERSIONED
}

impl Manifest {
    pub fn new(varbits: Vec<i32>, varps: Vec<i32>) -> Self {
        Self::with_version(UNVERSIONED, varbits, varps)
    }

    /// Build a manifest; duplicate ids are dropped, first occurrence wins
    pub fn with_version(version: i32, varbits: Vec<i32>, varps: Vec<i32>) -> Self {
        Self {
            version,
            varbits: dedup(varbits),
            varps: dedup(varps),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.varbits.is_empty() && self.varps.is_empty()
    }

    /// Decode a remote descriptor body
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: Manifest =
            serde_json::from_str(body).map_err(|e| SyncError::ManifestDecode(e.to_string()))?;
        Ok(Self::with_version(raw.version, raw.varbits, raw.varps))
    }
}

fn dedup(ids: Vec<i32>) -> Vec<i32> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Parse a comma separated id list such as `"1, 2,3"`.
///
/// Spaces are ignored, a blank string yields an empty list and trailing
/// empty segments are dropped. Any other malformed entry fails the whole list.
pub fn parse_id_list(field: &'static str, input: &str) -> Result<Vec<i32>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<&str> = compact.split(',').collect();
    while entries.last().is_some_and(|entry| entry.is_empty()) {
        entries.pop();
    }

    entries
        .into_iter()
        .map(|entry| {
            entry.parse::<i32>().map_err(|_| SyncError::ManifestParse {
                field,
                entry: entry.to_string(),
            })
        })
        .collect()
}

/// Resolves the current manifest
#[async_trait]
pub trait ManifestProvider: Send + Sync {
    async fn resolve(&self) -> Result<Manifest>;
}

/// Manifest built from the configuration's comma separated lists
#[derive(Debug, Clone)]
pub struct LocalManifestProvider {
    varbits: String,
    varps: String,
}

impl LocalManifestProvider {
    pub fn new(varbits: impl Into<String>, varps: impl Into<String>) -> Self {
        Self {
            varbits: varbits.into(),
            varps: varps.into(),
        }
    }
}

#[async_trait]
impl ManifestProvider for LocalManifestProvider {
    async fn resolve(&self) -> Result<Manifest> {
        let varbits = parse_id_list("varbits", &self.varbits)?;
        let varps = parse_id_list("varps", &self.varps)?;
        Ok(Manifest::new(varbits, varps))
    }
}

/// Manifest downloaded from a descriptor URL
#[derive(Debug, Clone)]
pub struct RemoteManifestProvider {
    client: reqwest::Client,
    url: String,
}

impl RemoteManifestProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ManifestProvider for RemoteManifestProvider {
    async fn resolve(&self) -> Result<Manifest> {
        if self.url.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "manifest source is server but no manifest url is set".to_string(),
            ));
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SyncError::ManifestFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ManifestFetch(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::ManifestFetch(e.to_string()))?;
        Manifest::from_json(&body)
    }
}

/// Pick the provider the configuration asks for
pub fn provider_for(config: &SyncConfig, client: &reqwest::Client) -> Box<dyn ManifestProvider> {
    match config.manifest_source {
        ManifestSource::Local => Box::new(LocalManifestProvider::new(
            config.manifest_varbits.clone(),
            config.manifest_varps.clone(),
        )),
        ManifestSource::Server => Box::new(RemoteManifestProvider::new(
            client.clone(),
            config.manifest_url.clone(),
        )),
    }
}

/// Shared slot holding the manifest currently in effect
#[derive(Debug, Clone, Default)]
pub struct ManifestHandle {
    inner: Arc<RwLock<Option<Arc<Manifest>>>>,
}

impl ManifestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manifest in effect, if one has ever been resolved
    pub fn current(&self) -> Option<Arc<Manifest>> {
        self.inner.read().clone()
    }

    /// Swap in a new manifest, returning the previous one
    pub fn replace(&self, manifest: Manifest) -> Option<Arc<Manifest>> {
        self.inner.write().replace(Arc::new(manifest))
    }

    /// Resolve through `provider` and swap on success.
    ///
    /// On failure the held manifest stays in effect and the error is returned
    /// for the caller to log.
    pub async fn refresh(&self, provider: &dyn ManifestProvider) -> Result<Arc<Manifest>> {
        let manifest = Arc::new(provider.resolve().await?);
        *self.inner.write() = Some(manifest.clone());
        tracing::info!(
            version = manifest.version,
            varbits = manifest.varbits.len(),
            varps = manifest.varps.len(),
            "Manifest updated"
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("varbits", "1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("varbits", "").unwrap(), Vec::<i32>::new());
        assert_eq!(parse_id_list("varbits", "   ").unwrap(), Vec::<i32>::new());
        assert_eq!(parse_id_list("varps", "4,5,").unwrap(), vec![4, 5]);
        assert_eq!(parse_id_list("varps", "-1").unwrap(), vec![-1]);
    }

    #[test]
    fn test_parse_id_list_rejects_malformed() {
        match parse_id_list("varbits", "1,x") {
            Err(SyncError::ManifestParse { field, entry }) => {
                assert_eq!(field, "varbits");
                assert_eq!(entry, "x");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(parse_id_list("varps", "1,,2").is_err());
    }

    #[test]
    fn test_manifest_dedups_ids() {
        let manifest = Manifest::new(vec![3, 1, 3, 2, 1], vec![7, 7]);
        assert_eq!(manifest.varbits, vec![3, 1, 2]);
        assert_eq!(manifest.varps, vec![7]);
    }

    #[test]
    fn test_manifest_from_json() {
        let manifest = Manifest::from_json(r#"{"version": 4, "varbits": [1, 1], "varps": [2]}"#).unwrap();
        assert_eq!(manifest, Manifest::with_version(4, vec![1], vec![2]));

        let manifest = Manifest::from_json(r#"{"varbits": [], "varps": [9]}"#).unwrap();
        assert_eq!(manifest.version, UNVERSIONED);

        assert!(matches!(
            Manifest::from_json(r#"{"varbits": "nope"}"#),
            Err(SyncError::ManifestDecode(_))
        ));
    }

    #[tokio::test]
    async fn test_local_provider() {
        let provider = LocalManifestProvider::new("10, 11", "101");
        let manifest = provider.resolve().await.unwrap();
        assert_eq!(manifest.varbits, vec![10, 11]);
        assert_eq!(manifest.varps, vec![101]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_manifest() {
        let handle = ManifestHandle::new();
        assert!(handle.current().is_none());

        handle
            .refresh(&LocalManifestProvider::new("1", "2"))
            .await
            .unwrap();

        let result = handle.refresh(&LocalManifestProvider::new("1,x", "2")).await;
        assert!(result.is_err());

        let current = handle.current().unwrap();
        assert_eq!(current.varbits, vec![1]);
        assert_eq!(current.varps, vec![2]);
    }

    #[tokio::test]
    async fn test_remote_provider_without_url() {
        let config = SyncConfig::new().with_manifest_source(ManifestSource::Server);
        let provider = provider_for(&config, &reqwest::Client::new());
        assert!(matches!(
            provider.resolve().await,
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_replace_returns_previous() {
        let handle = ManifestHandle::new();
        assert!(handle.replace(Manifest::new(vec![1], vec![])).is_none());
        let previous = handle.replace(Manifest::new(vec![2], vec![])).unwrap();
        assert_eq!(previous.varbits, vec![1]);
    }
}
