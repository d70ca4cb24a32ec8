//! Per-collection JSON snapshot files.
//!
//! One `<collection id>.json` file per collection lives under the cache
//! directory. Reads never fail the caller: a missing or damaged file reads as
//! an empty collection. All writes go through a single mutex owned by the
//! store, so refreshes of different collections also serialize.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use super::snapshot::{SNAPSHOT_VERSION, Snapshot, merge_pages, unix_now};
use crate::Error;
use crate::page::Page;

/// Freshness summary for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStatus {
    pub collection_id: String,
    pub present: bool,
    pub version: Option<u32>,
    pub pages: usize,
    pub timestamp: Option<f64>,
    pub age_secs: Option<f64>,
    pub expired: bool,
}

/// File-backed snapshot store.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    expiry: Duration,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// `expiry` is the full staleness window, grace period included.
    pub async fn open(dir: impl AsRef<Path>, expiry: Duration) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| Error::io(&dir, e))?;

        Ok(Self { dir, expiry, write_lock: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn path_for(&self, collection_id: &str) -> PathBuf {
        self.dir.join(format!("{collection_id}.json"))
    }

    /// Read and parse a snapshot, surfacing every failure.
    pub async fn load_snapshot(&self, collection_id: &str) -> Result<Snapshot, Error> {
        let path = self.path_for(collection_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::CacheMiss(collection_id.to_string())),
            Err(e) => return Err(Error::io(&path, e)),
        };

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Pages and timestamp for a collection, stale or not.
    ///
    /// Any failure reads as `(empty, now)`; the file is left as it is.
    pub async fn load(&self, collection_id: &str) -> (Vec<Page>, f64) {
        match self.load_snapshot(collection_id).await {
            Ok(snapshot) => (snapshot.pages, snapshot.timestamp),
            Err(Error::CacheMiss(_)) => (Vec::new(), unix_now()),
            Err(e) => {
                tracing::warn!(collection_id, error = %e, "unreadable snapshot, treating as empty");
                (Vec::new(), unix_now())
            }
        }
    }

    /// Merge `pages` into the stored snapshot and stamp it with the current time.
    ///
    /// The timestamp moves even when `pages` is empty.
    pub async fn save(&self, collection_id: &str, pages: Vec<Page>) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let existing = match self.load_snapshot(collection_id).await {
            Ok(snapshot) => snapshot.pages,
            Err(Error::CacheMiss(_)) => Vec::new(),
            Err(e) => {
                tracing::warn!(collection_id, error = %e, "discarding unreadable snapshot on save");
                Vec::new()
            }
        };

        let incoming = pages.len();
        let pages = merge_pages(existing, pages);
        let snapshot = Snapshot { version: SNAPSHOT_VERSION, timestamp: unix_now(), pages };

        self.write(collection_id, &snapshot).await?;

        tracing::debug!(collection_id, incoming, total = snapshot.pages.len(), "snapshot saved");
        Ok(())
    }

    /// Overwrite the stored snapshot wholesale.
    pub async fn replace(&self, collection_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        self.write(collection_id, snapshot).await
    }

    /// Whether the collection needs a refresh.
    pub async fn is_expired(&self, collection_id: &str) -> bool {
        match self.load_snapshot(collection_id).await {
            Ok(snapshot) => snapshot.is_expired_at(unix_now(), self.expiry),
            Err(_) => true,
        }
    }

    pub async fn status(&self, collection_id: &str) -> SnapshotStatus {
        let now = unix_now();
        match self.load_snapshot(collection_id).await {
            Ok(snapshot) => SnapshotStatus {
                collection_id: collection_id.to_string(),
                present: true,
                version: Some(snapshot.version),
                pages: snapshot.pages.len(),
                timestamp: Some(snapshot.timestamp),
                age_secs: Some(snapshot.age_at(now)),
                expired: snapshot.is_expired_at(now, self.expiry),
            },
            Err(e) => SnapshotStatus {
                collection_id: collection_id.to_string(),
                present: !e.is_miss(),
                version: None,
                pages: 0,
                timestamp: None,
                age_secs: None,
                expired: true,
            },
        }
    }

    /// Write through a sibling temp file so readers never see a partial document.
    /// Callers must hold `write_lock`.
    async fn write(&self, collection_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
        let path = self.path_for(collection_id);
        let tmp = self.dir.join(format!("{collection_id}.json.tmp"));

        let bytes = serde_json::to_vec(snapshot)?;
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| Error::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| Error::io(&path, e))?;

        Ok(())
    }
}
