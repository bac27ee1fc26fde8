//! Website content fetching

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::metrics::prometheus::CONTENT_FETCH_FAILURES;
use crate::{Error, Result};

/// User agent sent with every content request
pub const USER_AGENT: &str = "DummySite-Controller/1.0";

/// Source of the content mirrored into a DummySite
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the body served at `url`
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP implementation backed by reqwest
#[derive(Clone, Debug)]
pub struct HttpContentFetcher {
    http: reqwest::Client,
}

impl HttpContentFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching website content");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Fetch(e.to_string()))?;

        response.text().await.map_err(|e| Error::Fetch(e.to_string()))
    }
}

/// Fetch `url`, replacing any failure with an error page
///
/// The returned content is always usable, so a broken source site still
/// yields a Ready DummySite serving the placeholder.
pub async fn fetch_or_fallback(fetcher: &dyn ContentFetcher, url: &str) -> String {
    match fetcher.fetch(url).await {
        Ok(content) => content,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to fetch website content, serving error page");
            CONTENT_FETCH_FAILURES.inc();
            fallback_page(url, &e.to_string())
        }
    }
}

/// Error page stored when the source site cannot be fetched
pub fn fallback_page(url: &str, message: &str) -> String {
    format!(
        "<html><body><h1>Error fetching {}</h1><p>{}</p></body></html>",
        url, message
    )
}
