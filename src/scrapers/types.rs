use rand::Rng;
use std::ops::Range;
use std::time::Duration;

/// Origin used to resolve relative listing links
pub const SITE_ORIGIN: &str = "https://www.zillow.com";

/// Search results page for a ZIP code
pub fn search_url(zip_code: &str) -> String {
    format!("{}/homes/for_sale/{}_rb/", SITE_ORIGIN, zip_code)
}

/// Timeouts and courtesy delays shared by the fetchers
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound for a single navigation or request
    pub timeout: Duration,
    /// Random pause range in seconds, applied once per fetch
    pub courtesy_delay_secs: Range<f64>,
    pub user_agent: String,
}

impl FetchOptions {
    /// Defaults for headless-browser navigation
    pub fn browser() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// Defaults for plain HTTP requests
    pub fn http() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            ..Self::default()
        }
    }

    /// Options with no courtesy delay, for tests
    #[cfg(test)]
    pub fn without_delay(mut self) -> Self {
        self.courtesy_delay_secs = 0.0..0.0;
        self
    }

    /// Pick a delay from the configured range.
    pub fn courtesy_delay(&self) -> Duration {
        let range = self.courtesy_delay_secs.clone();
        if range.is_empty() {
            return Duration::from_secs_f64(range.start.max(0.0));
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(range))
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            courtesy_delay_secs: 2.0..5.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}
