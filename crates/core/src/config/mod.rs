//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TAGCACHE_*)
//! 2. TOML config file (if TAGCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::registry::{Collection, Registry, default_collections};

mod validation;

pub use validation::ConfigError;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TAGCACHE_*)
/// 2. TOML config file (if TAGCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// Directory holding one snapshot file per collection.
    ///
    /// Set via TAGCACHE_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Days before a snapshot is considered stale.
    ///
    /// Set via TAGCACHE_CACHE_EXPIRY_DAYS environment variable.
    #[serde(default = "default_cache_expiry_days")]
    pub cache_expiry_days: u64,

    /// Extra seconds of staleness tolerated to absorb mirror publishing lag.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Per-request timeout in seconds for API and mirror calls.
    ///
    /// Set via TAGCACHE_REQUEST_TIMEOUT_SECS environment variable.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Notion integration token.
    ///
    /// Set via TAGCACHE_NOTION_TOKEN environment variable.
    /// Required only for forced (incremental) refreshes.
    #[serde(default)]
    pub notion_token: Option<String>,

    /// Notion REST API base URL.
    #[serde(default = "default_notion_api_base_url")]
    pub notion_api_base_url: String,

    /// Value of the `Notion-Version` header.
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// Base URL of the static snapshot mirror; `<id>.json` is appended.
    #[serde(default = "default_mirror_base_url")]
    pub mirror_base_url: String,

    /// Well-known URL probed with HEAD to decide whether we are online.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Connectivity probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Pages requested per API query.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Root segment of every derived tag.
    #[serde(default = "default_tag_root")]
    pub tag_root: String,

    /// Collections available for search and refresh.
    #[serde(default = "default_collections")]
    pub collections: Vec<Collection>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_cache_expiry_days() -> u64 {
    7
}

fn default_grace_period_secs() -> u64 {
    60 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_notion_api_base_url() -> String {
    "https://api.notion.com/v1".into()
}

fn default_notion_version() -> String {
    "2022-06-28".into()
}

fn default_mirror_base_url() -> String {
    "https://raw.githubusercontent.com/Sabicool/Malleus-Anki-Addon/main/cache".into()
}

fn default_probe_url() -> String {
    "https://www.google.com".into()
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_page_size() -> u32 {
    100
}

fn default_tag_root() -> String {
    "#Malleus_CM".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_expiry_days: default_cache_expiry_days(),
            grace_period_secs: default_grace_period_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            notion_token: None,
            notion_api_base_url: default_notion_api_base_url(),
            notion_version: default_notion_version(),
            mirror_base_url: default_mirror_base_url(),
            probe_url: default_probe_url(),
            probe_timeout_ms: default_probe_timeout_ms(),
            page_size: default_page_size(),
            tag_root: default_tag_root(),
            collections: default_collections(),
        }
    }
}

impl AppConfig {
    /// Staleness window: expiry days plus the grace period.
    pub fn expiry_window(&self) -> Duration {
        let secs = self.cache_expiry_days.saturating_mul(SECONDS_PER_DAY).saturating_add(self.grace_period_secs);
        Duration::from_secs(secs)
    }

    /// Request timeout as Duration for use with reqwest/tokio.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn registry(&self) -> Registry {
        Registry::new(self.collections.clone())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TAGCACHE_`
    /// 2. TOML file from `TAGCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TAGCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("TAGCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that a Notion token is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_notion_token(&self) -> Result<&str, ConfigError> {
        self.notion_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "notion_token".into(),
                hint: "Set TAGCACHE_NOTION_TOKEN environment variable".into(),
            })
    }

    /// JSON schema of the configuration file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(AppConfig)).unwrap_or_default()
    }
}
