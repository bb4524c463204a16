mod config;
mod logging;
mod models;
mod pipeline;
mod scrapers;
mod sync;
mod web;

use clap::{Parser, Subcommand, ValueEnum};
use config::SettingsStore;
use pipeline::{Pipeline, RunOutcome};
use scrapers::{BrowserFetcher, HttpFetcher, PageFetcher};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use sync::AirtableClient;
use tracing::{error, info, warn};
use web::launcher::ScrapeLauncher;

#[derive(Parser)]
#[command(name = "zillow-sync", about = "Scrape Zillow listings for a ZIP code into Airtable")]
struct Cli {
    /// Settings file holding the Airtable credentials and ZIP code
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the listing page once and upsert the results
    Scrape {
        #[arg(long, value_enum, default_value_t = FetcherKind::Browser)]
        fetcher: FetcherKind,

        /// Save the fetched page here when no listings could be parsed
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Serve the configuration form
    Serve {
        #[arg(long, default_value = "0.0.0.0:58124")]
        bind: SocketAddr,

        /// File that scrape runs started from the form append their output to
        #[arg(long, default_value = "scraper.log")]
        log_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FetcherKind {
    /// Headless Chrome, renders client-side content
    Browser,
    /// Plain HTTP GET
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init("info")?;

    let store = SettingsStore::new(&cli.env_file);
    match cli.command {
        Command::Scrape { fetcher, debug_dir } => scrape(&store, fetcher, debug_dir).await,
        Command::Serve { bind, log_file } => {
            let launcher = ScrapeLauncher::for_current_exe(&cli.env_file, log_file)?;
            web::serve(bind, web::AppState::new(store, launcher)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn scrape(
    store: &SettingsStore,
    kind: FetcherKind,
    debug_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    info!("🏠 Zillow → Airtable scraper");

    let settings = match store.load().and_then(|s| s.validate().map(|()| s)) {
        Ok(settings) => settings,
        Err(e) => {
            error!(
                "Configuration problem in {}: {}. Run `zillow-sync serve` to set credentials and ZIP code",
                store.path().display(),
                e
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    let fetcher: Box<dyn PageFetcher> = match kind {
        FetcherKind::Browser => Box::new(BrowserFetcher::new()),
        FetcherKind::Http => Box::new(HttpFetcher::new()?),
    };
    let api = AirtableClient::new(&settings)?;

    let mut pipeline = Pipeline::new(fetcher.as_ref(), &api);
    if let Some(dir) = debug_dir {
        pipeline = pipeline.with_debug_dir(dir);
    }

    let outcome = pipeline.run(&settings).await;
    match &outcome {
        RunOutcome::Succeeded(_) => info!("Scraper finished: {}", outcome),
        RunOutcome::NoListings { .. } => warn!("Scraper finished: {}", outcome),
        RunOutcome::FailedFetch | RunOutcome::FailedSync(_) => {
            error!("Scraper finished: {}", outcome)
        }
    }

    Ok(ExitCode::SUCCESS)
}
