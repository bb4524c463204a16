use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::FetchOptions;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Browser-based fetcher using headless Chrome
///
/// Each fetch launches its own browser process. The process is killed when the
/// `Browser` handle drops, so the session is released on every exit path,
/// including navigation errors and timeouts.
pub struct BrowserFetcher {
    options: FetchOptions,
}

impl BrowserFetcher {
    pub fn new() -> Self {
        Self::with_options(FetchOptions::browser())
    }

    pub fn with_options(options: FetchOptions) -> Self {
        Self { options }
    }
}

impl Default for BrowserFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let url = url.to_string();
        let options = self.options.clone();

        tokio::task::spawn_blocking(move || capture_page(&url, &options))
            .await
            .context("Browser task panicked")?
    }

    fn source_name(&self) -> &'static str {
        "headless-chrome"
    }
}

fn capture_page(url: &str, options: &FetchOptions) -> Result<String> {
    info!("Launching headless Chrome...");

    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .idle_browser_timeout(options.timeout + Duration::from_secs(30))
        .build()
        .context("Failed to build launch options")?;

    let browser = Browser::new(launch_options).context("Failed to launch Chrome browser")?;
    let tab = browser.new_tab().context("Failed to open tab")?;

    let result = navigate_and_capture(&tab, url, options);

    if let Err(e) = tab.close(true) {
        debug!("Closing tab failed: {:#}", e);
    }
    result
}

fn navigate_and_capture(tab: &Tab, url: &str, options: &FetchOptions) -> Result<String> {
    tab.set_default_timeout(options.timeout);
    tab.set_user_agent(&options.user_agent, Some("en-US,en;q=0.9"), None)
        .context("Failed to set user agent")?;

    tab.navigate_to(url)
        .with_context(|| format!("Navigation to {} failed", url))?;
    tab.wait_until_navigated()
        .with_context(|| format!("Timed out waiting for {} to load", url))?;

    // Give client-side rendering time to settle
    let delay = options.courtesy_delay();
    info!("Waiting {:.1}s for page to settle...", delay.as_secs_f64());
    thread::sleep(delay);

    let html = tab.get_content().context("Failed to capture page HTML")?;
    if html.trim().is_empty() {
        anyhow::bail!("Page HTML is empty");
    }

    Ok(html)
}
