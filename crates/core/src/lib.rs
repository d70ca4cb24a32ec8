//! Core types and shared functionality for tagcache.
//!
//! This crate provides:
//! - File-backed snapshot cache per collection
//! - Fuzzy search and ranking over cached pages
//! - Tag parsing and derivation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod page;
pub mod preferences;
pub mod registry;
pub mod search;
pub mod tags;

pub use cache::{Snapshot, SnapshotStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use host::{Host, InlineHost, MainTask};
pub use page::{Page, Resolution};
pub use preferences::Preferences;
pub use registry::{Collection, Registry};
