//! Local settings form: edit the `.env` file and kick off scrape runs.

pub mod launcher;
pub mod templates;

use crate::config::{Settings, SettingsStore};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use launcher::ScrapeLauncher;
use maud::Markup;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use templates::Flash;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    store: SettingsStore,
    launcher: ScrapeLauncher,
    flash: Arc<Mutex<Option<Flash>>>,
}

impl AppState {
    pub fn new(store: SettingsStore, launcher: ScrapeLauncher) -> Self {
        Self {
            store,
            launcher,
            flash: Arc::new(Mutex::new(None)),
        }
    }

    fn set_flash(&self, flash: Flash) {
        if let Ok(mut slot) = self.flash.lock() {
            *slot = Some(flash);
        }
    }

    fn take_flash(&self) -> Option<Flash> {
        self.flash.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    access_token: String,
    base_id: String,
    zip_code: String,
}

impl From<SettingsForm> for Settings {
    fn from(form: SettingsForm) -> Self {
        Settings {
            access_token: form.access_token.trim().to_string(),
            base_id: form.base_id.trim().to_string(),
            zip_code: form.zip_code.trim().to_string(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_settings).post(save_settings))
        .route("/run", post(start_run))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Config form listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn show_settings(State(state): State<AppState>) -> Markup {
    let mut flash = state.take_flash();
    let settings = match state.store.load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Could not load settings: {}", e);
            flash = Some(Flash::error(format!("Error loading configuration: {e}")));
            Settings::default()
        }
    };
    templates::settings_page(&settings, flash.as_ref())
}

async fn save_settings(State(state): State<AppState>, Form(form): Form<SettingsForm>) -> Redirect {
    let settings = Settings::from(form);

    let flash = match settings.validate().and_then(|()| state.store.save(&settings)) {
        Ok(()) => Flash::success("Configuration saved successfully!"),
        Err(e) => {
            warn!("Rejected configuration: {}", e);
            Flash::error(format!("Error saving configuration: {e}"))
        }
    };
    state.set_flash(flash);

    Redirect::to("/")
}

async fn start_run(State(state): State<AppState>) -> Response {
    match state.launcher.spawn() {
        Ok(pid) => {
            let log_file = state.launcher.log_file().display().to_string();
            templates::run_started_page(pid, &log_file).into_response()
        }
        Err(e) => {
            error!("Could not start scraper: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::run_failed_page(&format!("Could not start scraper: {e:#}")),
            )
                .into_response()
        }
    }
}
