//! Static snapshot mirror.
//!
//! The mirror publishes one `<id>.json` per collection at a fixed base URL.
//! Downloads need no credentials and replace the local snapshot wholesale.
//! Two document shapes are accepted:
//!
//! - a full snapshot `{version, timestamp, pages}`, written as-is
//! - a bare array of pages, wrapped and stamped with the current time

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tagcache_core::cache::SNAPSHOT_VERSION;
use tagcache_core::{AppConfig, Page, Registry, Snapshot, SnapshotStore};

use crate::probe::Connectivity;

/// Errors from a single mirror download.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("invalid mirror URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] tagcache_core::Error),
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { MirrorError::Timeout } else { MirrorError::Network(err) }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MirrorDocument {
    Pages(Vec<Page>),
    Snapshot(Snapshot),
}

impl MirrorDocument {
    fn into_snapshot(self) -> Result<Snapshot, MirrorError> {
        match self {
            MirrorDocument::Pages(pages) => Ok(Snapshot::with_pages(pages)),
            MirrorDocument::Snapshot(snapshot) if snapshot.version == SNAPSHOT_VERSION => Ok(snapshot),
            MirrorDocument::Snapshot(snapshot) => Err(tagcache_core::Error::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            }
            .into()),
        }
    }
}

/// Parse a mirror body into a snapshot ready to store.
pub fn parse_document(bytes: &[u8]) -> Result<Snapshot, MirrorError> {
    serde_json::from_slice::<MirrorDocument>(bytes)
        .map_err(|e| MirrorError::Parse(e.to_string()))?
        .into_snapshot()
}

/// Downloads mirror snapshots into a [`SnapshotStore`].
pub struct MirrorClient {
    http: reqwest::Client,
    base_url: url::Url,
    store: Arc<SnapshotStore>,
    registry: Registry,
    probe: Arc<dyn Connectivity>,
}

impl MirrorClient {
    pub fn new(
        base_url: impl Into<String>, timeout: Duration, store: Arc<SnapshotStore>, registry: Registry,
        probe: Arc<dyn Connectivity>,
    ) -> Result<Self, MirrorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tagcache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = url::Url::parse(base_url.into().trim_end_matches('/'))?;

        Ok(Self { http, base_url, store, registry, probe })
    }

    pub fn from_app(
        config: &AppConfig, store: Arc<SnapshotStore>, probe: Arc<dyn Connectivity>,
    ) -> Result<Self, MirrorError> {
        Self::new(config.mirror_base_url.clone(), config.request_timeout(), store, config.registry(), probe)
    }

    pub fn url_for(&self, collection_id: &str) -> String {
        format!("{}/{}.json", self.base_url.as_str().trim_end_matches('/'), collection_id)
    }

    /// Download and store one collection, reporting the page count.
    pub async fn try_download(&self, collection_id: &str) -> Result<usize, MirrorError> {
        let start = Instant::now();
        let url = self.url_for(collection_id);
        tracing::debug!(collection_id, %url, "downloading mirror snapshot");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let snapshot = parse_document(&bytes)?;
        let pages = snapshot.pages.len();
        self.store.replace(collection_id, &snapshot).await?;

        tracing::info!(collection_id, pages, elapsed = ?start.elapsed(), "mirror snapshot stored");
        Ok(pages)
    }

    /// Download one collection; failures are logged and reported as `false`.
    pub async fn download_mirror(&self, collection_id: &str) -> bool {
        match self.try_download(collection_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(collection_id, error = %e, "mirror download failed");
                false
            }
        }
    }

    /// Download every registered collection.
    ///
    /// Every collection is attempted; those already written stay written when
    /// a later one fails. Returns `false` without trying when offline.
    pub async fn download_all_mirrors(&self) -> bool {
        if !self.probe.is_online().await {
            tracing::info!("offline, skipping mirror download");
            return false;
        }

        let mut all_ok = true;
        for collection in self.registry.iter() {
            all_ok &= self.download_mirror(&collection.id).await;
        }
        all_ok
    }
}
