//! Unified error types for tagcache.
//!
//! Most cache paths degrade instead of failing, so these errors surface
//! mainly from the strict loaders and from registry lookups.

use std::path::PathBuf;

/// Unified error types for the cache core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty collection name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Collection name or id is not in the registry.
    #[error("UNKNOWN_COLLECTION: {0}")]
    UnknownCollection(String),

    /// No snapshot file exists for the collection yet.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Snapshot was written by an incompatible schema version.
    #[error("CACHE_VERSION_MISMATCH: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Reading or writing a cache file failed.
    #[error("CACHE_IO: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot or preference file could not be (de)serialized.
    #[error("CACHE_PARSE: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Whether this error means "nothing cached yet" rather than damage.
    pub fn is_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownCollection("Anatomy".to_string());
        assert!(err.to_string().contains("UNKNOWN_COLLECTION"));
        assert!(err.to_string().contains("Anatomy"));
    }

    #[test]
    fn test_version_mismatch_display() {
        let err = Error::VersionMismatch { expected: 1, found: 2 };
        assert_eq!(err.to_string(), "CACHE_VERSION_MISMATCH: expected 1, found 2");
    }

    #[test]
    fn test_is_miss() {
        assert!(Error::CacheMiss("x".into()).is_miss());
        assert!(!Error::InvalidInput("x".into()).is_miss());
    }
}
