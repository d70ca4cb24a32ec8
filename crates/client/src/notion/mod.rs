//! Notion database query client.
//!
//! Provides the authoritative source for incremental syncs.
//!
//! ### Protocol
//!
//! - **Endpoint**: `POST {base_url}/databases/{id}/query`
//! - **Authentication**: `Authorization: Bearer <token>` plus a fixed
//!   `Notion-Version` header.
//! - **Pagination**: each response carries `has_more` and `next_cursor`;
//!   callers loop with `start_cursor` until `has_more` is false.
//! - **Failures**: 401/403 map to auth errors, 429 to rate limiting, other
//!   4xx/5xx to HTTP errors; timeouts are distinguished from other I/O.

pub mod error;
pub mod request;
pub mod response;

pub use error::NotionError;
pub use request::{INCLUSION_PROPERTY, QueryRequest};
pub use response::QueryResponse;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header;
use tagcache_core::AppConfig;

/// Default base URL for the Notion API.
const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// API version pinned by this client.
const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = concat!("tagcache/", env!("CARGO_PKG_VERSION"));

/// Anything that can answer a database query.
///
/// The HTTP client is the production implementation; tests substitute
/// scripted transports to exercise partial failures.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn query(&self, database_id: &str, request: &QueryRequest) -> Result<QueryResponse, NotionError>;
}

/// Notion client configuration.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Integration token.
    pub token: String,
    /// Base URL (default: https://api.notion.com/v1).
    pub base_url: String,
    /// `Notion-Version` header value.
    pub version: String,
    /// Request timeout (default: 30s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_NOTION_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl NotionConfig {
    /// Build from application configuration. Fails without a token.
    pub fn from_app(config: &AppConfig) -> Result<Self, NotionError> {
        let token = config.require_notion_token().map_err(|_| NotionError::MissingToken)?;

        Ok(Self {
            token: token.to_string(),
            base_url: config.notion_api_base_url.trim_end_matches('/').to_string(),
            version: config.notion_version.clone(),
            timeout: config.request_timeout(),
            ..Default::default()
        })
    }
}

/// Notion REST client.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
}

impl NotionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: NotionConfig) -> Result<Self, NotionError> {
        if config.token.is_empty() {
            return Err(NotionError::MissingToken);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &NotionConfig {
        &self.config
    }
}

#[async_trait]
impl QueryTransport for NotionClient {
    async fn query(&self, database_id: &str, request: &QueryRequest) -> Result<QueryResponse, NotionError> {
        let start = Instant::now();
        let url = format!("{}/databases/{}/query", self.config.base_url, database_id);

        tracing::debug!(database_id, cursor = ?request.start_cursor, "querying Notion");

        let http_response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Notion-Version", &self.config.version)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!("Notion API response status: {}", status);

        if status == 401 || status == 403 {
            return Err(NotionError::AuthError);
        }

        if status == 429 {
            return Err(NotionError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(NotionError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let response: QueryResponse = serde_json::from_slice(&bytes).map_err(|e| NotionError::Parse(e.to_string()))?;

        tracing::debug!(
            "query completed in {:?}, {} results, has_more={}",
            start.elapsed(),
            response.results.len(),
            response.has_more
        );

        Ok(response)
    }
}
