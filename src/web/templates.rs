use crate::config::Settings;
use maud::{html, Markup, PreEscaped, DOCTYPE};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 20px; }
label { display: block; margin-top: 10px; font-weight: bold; }
input[type=text] { width: 90%; max-width: 500px; padding: 8px; margin-top: 5px; border: 1px solid #ccc; border-radius: 4px; }
button { margin-top: 20px; padding: 10px 15px; background-color: #007bff; color: white; border: none; border-radius: 4px; cursor: pointer; }
button:hover { background-color: #0056b3; }
.flash { padding: 10px; margin-top: 15px; border-radius: 4px; }
.flash.success { background-color: #d4edda; color: #155724; border: 1px solid #c3e6cb; }
.flash.error { background-color: #f8d7da; color: #721c24; border: 1px solid #f5c6cb; }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot message shown on the next page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Error, message: message.into() }
    }

    fn class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "flash success",
            FlashKind::Error => "flash error",
        }
    }
}

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(STYLE)) }
            }
            body { (content) }
        }
    }
}

pub fn settings_page(settings: &Settings, flash: Option<&Flash>) -> Markup {
    layout(
        "Zillow Scraper Configuration",
        html! {
            h1 { "Zillow Scraper Configuration" }
            @if let Some(flash) = flash {
                div class=(flash.class()) { (flash.message) }
            }
            form method="post" action="/" {
                label for="access_token" { "Airtable Personal Access Token:" }
                input type="text" id="access_token" name="access_token"
                    value=(settings.access_token) required;

                label for="base_id" { "Airtable Base ID:" }
                input type="text" id="base_id" name="base_id"
                    value=(settings.base_id) required;

                label for="zip_code" { "ZIP Code:" }
                input type="text" id="zip_code" name="zip_code"
                    value=(settings.zip_code) pattern="[0-9]{5}" required;

                button type="submit" { "Save Configuration" }
            }
            form method="post" action="/run" {
                button type="submit" { "Run Scraper Now" }
            }
        },
    )
}

pub fn run_started_page(pid: u32, log_file: &str) -> Markup {
    layout(
        "Scraper started",
        html! {
            h1 { "Scraper started" }
            div class="flash success" {
                "Started scraper process " (pid) ". Output is appended to " code { (log_file) } "."
            }
            p { a href="/" { "Back to configuration" } }
        },
    )
}

pub fn run_failed_page(message: &str) -> Markup {
    layout(
        "Scraper not started",
        html! {
            h1 { "Scraper not started" }
            div class="flash error" { (message) }
            p { a href="/" { "Back to configuration" } }
        },
    )
}
