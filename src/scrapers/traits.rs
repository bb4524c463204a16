use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};
use url::Url;

/// Common trait for page fetchers
/// Lets the pipeline swap the headless browser for plain HTTP (or a fake in tests)
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the HTML behind an already validated URL
    async fn fetch_html(&self, url: &Url) -> Result<String>;

    /// Get the name of the fetcher
    fn source_name(&self) -> &'static str;
}

/// Accept only absolute http(s) URLs.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => anyhow::bail!("unsupported URL '{}' (scheme '{}')", raw, scheme),
    }
}

/// Fetch a page, logging any failure and reporting it as no content.
pub async fn fetch_page(fetcher: &dyn PageFetcher, raw_url: &str) -> Option<String> {
    let url = match validate_url(raw_url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid search URL: {:#}", e);
            return None;
        }
    };

    info!("Fetching {} via {}", url, fetcher.source_name());
    match fetcher.fetch_html(&url).await {
        Ok(html) => {
            info!("Fetched {} bytes of HTML", html.len());
            Some(html)
        }
        Err(e) => {
            error!("Failed to fetch {}: {:#}", url, e);
            None
        }
    }
}
