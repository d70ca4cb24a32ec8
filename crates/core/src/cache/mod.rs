//! File-backed cache of remote collections.
//!
//! This module provides the local snapshot layer:
//!
//! - One JSON snapshot per collection, named by remote id
//! - Merge-by-id saves with an unconditional timestamp touch
//! - Wholesale replacement for mirror downloads
//! - Staleness checks against a configured window

pub mod snapshot;
pub mod store;

pub use crate::Error;

pub use snapshot::{SNAPSHOT_VERSION, Snapshot, merge_pages, unix_now};
pub use store::{SnapshotStatus, SnapshotStore};
