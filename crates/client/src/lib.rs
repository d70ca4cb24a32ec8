//! Network side of tagcache.
//!
//! This crate provides the Notion query client, the incremental sync loop,
//! the static mirror downloader, a connectivity probe, and the refresh
//! orchestrator that ties them to a [`tagcache_core::SnapshotStore`].

pub mod mirror;
pub mod notion;
pub mod probe;
pub mod refresh;
pub mod sync;

pub use mirror::{MirrorClient, MirrorError};
pub use notion::{NotionClient, NotionConfig, NotionError, QueryRequest, QueryResponse, QueryTransport};
pub use probe::{AssumeOnline, Connectivity, HttpProbe};
pub use refresh::{CheckOutcome, CollectionCheck, ExportedCollection, RefreshError, RefreshHandle, Refresher};
pub use sync::{SyncOptions, SyncOutcome, build_snapshot, cutoff_date, fetch_all, fetch_changed_since, sync_pages};
