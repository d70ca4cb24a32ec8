//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::{AppConfig, SECONDS_PER_DAY};
use thiserror::Error;

/// Longest grace period accepted on top of the expiry days.
pub const MAX_GRACE_PERIOD_SECS: u64 = 7 * SECONDS_PER_DAY;

/// Longest connectivity probe timeout, in milliseconds.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_expiry_days` is 0 or exceeds a year
    /// - `grace_period_secs` exceeds a week
    /// - `probe_timeout_ms` is 0 or exceeds a minute
    /// - `request_timeout_secs` is 0 or exceeds 5 minutes
    /// - `page_size` is outside 1..=100
    /// - any base URL does not parse
    /// - a collection name or id is empty or repeated
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=365).contains(&self.cache_expiry_days) {
            return Err(invalid("cache_expiry_days", "must be between 1 and 365"));
        }

        if self.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(invalid("grace_period_secs", "must not exceed 7 days (604800s)"));
        }

        if !(1..=MAX_PROBE_TIMEOUT_MS).contains(&self.probe_timeout_ms) {
            return Err(invalid("probe_timeout_ms", "must be between 1 and 60000"));
        }

        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1 second"));
        }
        if self.request_timeout_secs > 300 {
            return Err(invalid("request_timeout_secs", "must not exceed 5 minutes (300s)"));
        }

        if !(1..=100).contains(&self.page_size) {
            return Err(invalid("page_size", "must be between 1 and 100"));
        }

        for (field, value) in [
            ("notion_api_base_url", &self.notion_api_base_url),
            ("mirror_base_url", &self.mirror_base_url),
            ("probe_url", &self.probe_url),
        ] {
            url::Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
        }

        if self.tag_root.trim().is_empty() {
            return Err(invalid("tag_root", "must not be empty"));
        }

        if self.collections.is_empty() {
            return Err(invalid("collections", "at least one collection is required"));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() || collection.id.trim().is_empty() {
                return Err(invalid("collections", "name and id must not be empty"));
            }
            if !names.insert(collection.name.to_lowercase()) {
                return Err(invalid("collections", format!("duplicate name '{}'", collection.name)));
            }
            if !ids.insert(collection.id.as_str()) {
                return Err(invalid("collections", format!("duplicate id '{}'", collection.id)));
            }
        }

        if self.notion_token.is_none() {
            tracing::debug!("notion_token not set; forced refreshes will be unavailable");
        }

        Ok(())
    }
}
