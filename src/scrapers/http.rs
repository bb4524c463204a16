use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::FetchOptions;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Plain HTTP fetcher, for pages that don't need JavaScript
pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    /// Create a fetcher with default HTTP options
    pub fn new() -> Result<Self> {
        Self::with_options(FetchOptions::http())
    }

    pub fn with_options(options: FetchOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, options })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let delay = self.options.courtesy_delay();
        debug!("Sleeping {:?} before request", delay);
        tokio::time::sleep(delay).await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            warn!("Listing site returned status: {}", status);
            anyhow::bail!("unexpected status {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
