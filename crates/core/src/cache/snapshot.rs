//! On-disk snapshot document and the merge rule.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::page::Page;

/// Schema version written by this crate. Any other value reads as expired.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One collection's cached pages plus freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,

    /// Unix seconds of the last successful write (not of the last change).
    #[serde(default)]
    pub timestamp: f64,

    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Snapshot {
    /// An empty snapshot stamped with `now`.
    pub fn empty() -> Self {
        Self { version: SNAPSHOT_VERSION, timestamp: unix_now(), pages: Vec::new() }
    }

    pub fn with_pages(pages: Vec<Page>) -> Self {
        Self { pages, ..Self::empty() }
    }

    /// Seconds since the last write, relative to `now`.
    pub fn age_at(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    /// Expired when the schema differs or the age exceeds `window`.
    pub fn is_expired_at(&self, now: f64, window: Duration) -> bool {
        self.version != SNAPSHOT_VERSION || self.age_at(now) > window.as_secs_f64()
    }
}

/// Current wall-clock time as fractional unix seconds.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Merge `incoming` into `existing` by page id.
///
/// Later values win. Existing pages keep their position; ids seen for the
/// first time are appended in arrival order.
pub fn merge_pages(existing: Vec<Page>, incoming: Vec<Page>) -> Vec<Page> {
    let mut merged: Vec<Page> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for page in existing.into_iter().chain(incoming) {
        match index.get(&page.id) {
            Some(&pos) => merged[pos] = page,
            None => {
                index.insert(page.id.clone(), merged.len());
                merged.push(page);
            }
        }
    }

    merged
}
