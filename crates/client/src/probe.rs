//! Connectivity check.

use std::time::Duration;

use async_trait::async_trait;
use tagcache_core::AppConfig;

/// Answers "can we reach the network right now?".
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// HEAD request against a well-known URL with a short timeout.
///
/// Any response, whatever its status, counts as online.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }

    pub fn from_app(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.probe_url.clone(), config.probe_timeout())
    }
}

#[async_trait]
impl Connectivity for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.http.head(&self.url).send().await {
            Ok(response) => {
                tracing::debug!(url = %self.url, status = %response.status(), "probe answered");
                true
            }
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "probe failed");
                false
            }
        }
    }
}

/// Fixed answer, for offline mode and tests.
#[derive(Debug, Clone, Copy)]
pub struct AssumeOnline(pub bool);

#[async_trait]
impl Connectivity for AssumeOnline {
    async fn is_online(&self) -> bool {
        self.0
    }
}
