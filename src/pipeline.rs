//! One scrape run: fetch → extract → sync, no retries.

use crate::config::Settings;
use crate::scrapers::listing::extract_listings;
use crate::scrapers::traits::{fetch_page, PageFetcher};
use crate::scrapers::types::search_url;
use crate::sync::{SyncEngine, SyncReport, TableApi};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Intermediate states, logged as the run advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Extracting,
    Syncing,
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded(SyncReport),
    FailedFetch,
    FailedSync(SyncReport),
    NoListings { skipped: usize },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Succeeded(report) => write!(
                f,
                "succeeded ({} records processed in '{}')",
                report.processed, report.table
            ),
            RunOutcome::FailedFetch => write!(f, "failed to fetch the listing page"),
            RunOutcome::FailedSync(report) => {
                write!(f, "failed to sync to '{}'", report.table)
            }
            RunOutcome::NoListings { skipped } => {
                write!(f, "no listings parsed ({} cards skipped)", skipped)
            }
        }
    }
}

pub struct Pipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    api: &'a dyn TableApi,
    /// Where to dump the page when nothing could be parsed
    debug_dir: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, api: &'a dyn TableApi) -> Self {
        Self {
            fetcher,
            api,
            debug_dir: None,
        }
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub async fn run(&self, settings: &Settings) -> RunOutcome {
        let mut state = RunState::Idle;
        let url = search_url(&settings.zip_code);
        info!("Search URL for ZIP {}: {}", settings.zip_code, url);

        transition(&mut state, RunState::Fetching);
        let Some(html) = fetch_page(self.fetcher, &url).await else {
            error!("Failed to fetch listing page, run aborted");
            return RunOutcome::FailedFetch;
        };

        transition(&mut state, RunState::Extracting);
        let extraction = extract_listings(&html);
        if extraction.records.is_empty() {
            warn!("No properties parsed, nothing to send");
            self.save_debug_page(&html).await;
            return RunOutcome::NoListings {
                skipped: extraction.skipped,
            };
        }

        transition(&mut state, RunState::Syncing);
        let report = SyncEngine::new(self.api)
            .sync(extraction.records, &settings.zip_code)
            .await;

        if report.success() {
            RunOutcome::Succeeded(report)
        } else {
            RunOutcome::FailedSync(report)
        }
    }

    async fn save_debug_page(&self, html: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let path = dir.join("listing_page.html");
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, html).await
        }
        .await;

        match result {
            Ok(()) => info!("Saved page HTML to {} ({} bytes)", path.display(), html.len()),
            Err(e) => warn!("Could not save page HTML to {}: {}", path.display(), e),
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    info!("Run state: {:?} -> {:?}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::engine::fake::{Call, FakeBase};
    use crate::sync::schema::FIELD_PRICE;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use url::Url;

    struct FakeFetcher {
        html: Option<String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn returning(html: Option<&str>) -> Self {
            Self {
                html: html.map(str::to_string),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.html
                .clone()
                .ok_or_else(|| anyhow::anyhow!("navigation timed out"))
        }

        fn source_name(&self) -> &'static str {
            "fake"
        }
    }

    fn settings() -> Settings {
        Settings {
            access_token: "pat123.secret".to_string(),
            base_id: "appXYZ".to_string(),
            zip_code: "90210".to_string(),
        }
    }

    const TWO_CARDS: &str = r#"<html><body>
        <article class="list-card" data-zpid="A1">
          <a class="list-card-link" href="/homedetails/A1_zpid/">
            <address class="list-card-addr">1 Rodeo Dr</address>
          </a>
          <div class="list-card-price">$500,000</div>
        </article>
        <article class="list-card">
          <address class="list-card-addr">2 Rodeo Dr</address>
          <div class="list-card-price">$750,000</div>
        </article>
    </body></html>"#;

    #[tokio::test]
    async fn end_to_end_upserts_the_valid_card() {
        let fetcher = FakeFetcher::returning(Some(TWO_CARDS));
        let base = FakeBase::default();

        let outcome = Pipeline::new(&fetcher, &base).run(&settings()).await;

        let RunOutcome::Succeeded(report) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(report.table, "ZIP_90210");
        assert!(report.created_table);
        assert_eq!(report.processed, 1);

        assert_eq!(
            fetcher.requested.lock().unwrap().as_slice(),
            ["https://www.zillow.com/homes/for_sale/90210_rb/"]
        );

        let calls = base.calls();
        assert!(matches!(&calls[1], Call::Create(schema) if schema.name == "ZIP_90210"));
        let Call::Upsert { records, .. } = &calls[2] else {
            panic!("expected an upsert call");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier, "A1");
        assert_eq!(records[0].price, Some(500_000));
        assert_eq!(base.rows("ZIP_90210")["A1"][FIELD_PRICE], serde_json::json!(500_000));
    }

    #[tokio::test]
    async fn fetch_failure_makes_no_api_calls() {
        let fetcher = FakeFetcher::returning(None);
        let base = FakeBase::default();

        let outcome = Pipeline::new(&fetcher, &base).run(&settings()).await;

        assert_eq!(outcome, RunOutcome::FailedFetch);
        assert!(base.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_page_ends_with_no_listings() {
        let fetcher = FakeFetcher::returning(Some("<html><body>Please verify you're a human</body></html>"));
        let base = FakeBase::default();
        let dir = tempfile::tempdir().unwrap();

        let outcome = Pipeline::new(&fetcher, &base)
            .with_debug_dir(dir.path().join("debug"))
            .run(&settings())
            .await;

        assert_eq!(outcome, RunOutcome::NoListings { skipped: 0 });
        assert!(base.calls().is_empty());
        let saved = std::fs::read_to_string(dir.path().join("debug/listing_page.html")).unwrap();
        assert!(saved.contains("verify you're a human"));
    }

    #[tokio::test]
    async fn sync_failure_is_terminal() {
        let fetcher = FakeFetcher::returning(Some(TWO_CARDS));
        let base = FakeBase { fail_upsert: true, ..FakeBase::default() };

        let outcome = Pipeline::new(&fetcher, &base).run(&settings()).await;

        assert!(matches!(outcome, RunOutcome::FailedSync(ref r) if r.table == "ZIP_90210"));
    }
}
