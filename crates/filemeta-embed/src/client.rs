//! HTTP client shared by the oEmbed, page scrape, and favicon requests.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::{debug, warn};
use url::Url;

use filemeta_core::defaults::{
    BROWSER_USER_AGENT, EMBED_MAX_PAGE_BYTES, EMBED_REQUEST_TIMEOUT_SECS,
    ENV_EMBED_REQUEST_TIMEOUT_SECS,
};
use filemeta_core::{env_secs, Error, Result};

/// A fetched text document and the URL it was served from after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub body: String,
}

/// Browser-identifying HTTP client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct EmbedClient {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl EmbedClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            max_body_bytes: EMBED_MAX_PAGE_BYTES,
        })
    }

    /// Create from `EMBED_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let secs = env_secs(ENV_EMBED_REQUEST_TIMEOUT_SECS, EMBED_REQUEST_TIMEOUT_SECS)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Using default embed request timeout");
                EMBED_REQUEST_TIMEOUT_SECS
            });
        Self::new(Duration::from_secs(secs))
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Request(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }

    /// GET a text document, reading at most the configured body limit.
    pub async fn fetch_text(&self, url: &Url) -> Result<FetchedPage> {
        let mut response = self.get(url).await?;
        let final_url = response.url().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(url = %url, limit = self.max_body_bytes, "Truncated response body");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    /// GET a JSON document.
    pub async fn fetch_json(&self, url: &Url) -> Result<serde_json::Value> {
        let page = self.fetch_text(url).await?;
        serde_json::from_str(&page.body)
            .map_err(|e| Error::Request(format!("Invalid JSON from {}: {}", url, e)))
    }

    /// Whether a GET of `url` succeeds with a non-empty body.
    pub async fn exists(&self, url: &Url) -> Result<bool> {
        let response = match self.get(url).await {
            Ok(response) => response,
            Err(Error::Request(message)) => {
                debug!(url = %url, error = %message, "Resource not available");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let bytes = response.bytes().await?;
        Ok(!bytes.is_empty())
    }
}
