//! Listing-card extraction from a search results page.

use crate::models::PropertyRecord;
use crate::scrapers::types::SITE_ORIGIN;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Records parsed from one page, plus how many cards were dropped
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<PropertyRecord>,
    pub skipped: usize,
}

/// Why a single card could not become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("card has no listing identifier")]
    MissingIdentifier,
}

/// Compiled selectors for the result cards
struct CardSelectors {
    card: Selector,
    address: Selector,
    price: Selector,
    detail: Selector,
    link: Selector,
    status: Selector,
}

impl CardSelectors {
    fn new() -> Self {
        let parse = |css: &str| Selector::parse(css).expect("static selector is valid");
        Self {
            card: parse("article.list-card"),
            address: parse("address.list-card-addr"),
            price: parse("div.list-card-price"),
            detail: parse("ul.list-card-details li"),
            link: parse("a.list-card-link[href]"),
            status: parse("div.list-card-type"),
        }
    }
}

/// Parse every listing card in `html`.
pub fn extract_listings(html: &str) -> Extraction {
    let document = Html::parse_document(html);
    let selectors = CardSelectors::new();

    let cards: Vec<_> = document.select(&selectors.card).collect();
    if cards.is_empty() {
        warn!(
            "No property cards found. The site structure may have changed, \
             or the page was blocked (captcha)"
        );
        return Extraction::default();
    }
    info!("Found {} property cards in HTML", cards.len());

    let mut extraction = Extraction::default();
    for (idx, card) in cards.into_iter().enumerate() {
        match parse_card(card, &selectors) {
            Ok(record) => extraction.records.push(record),
            Err(e) => {
                debug!("Skipped card {}: {}", idx, e);
                extraction.skipped += 1;
            }
        }
    }

    if extraction.records.is_empty() {
        warn!("All {} property cards were skipped", extraction.skipped);
    } else {
        info!(
            "Parsed {} properties ({} cards skipped)",
            extraction.records.len(),
            extraction.skipped
        );
    }

    extraction
}

fn parse_card(card: ElementRef<'_>, selectors: &CardSelectors) -> Result<PropertyRecord, CardError> {
    let identifier = card_identifier(card).ok_or(CardError::MissingIdentifier)?;
    let mut record = PropertyRecord::new(identifier);

    record.address = first_text(card, &selectors.address);
    record.status = first_text(card, &selectors.status);

    if let Some(price_text) = first_text(card, &selectors.price) {
        match parse_price(&price_text) {
            Some(price) => record.price = Some(price),
            // "Auction", "Contact agent" and friends
            None => record.status = Some(price_text),
        }
    }

    for item in card.select(&selectors.detail) {
        let text = element_text(item);
        let lower = text.to_lowercase();
        if lower.contains("sqft") || lower.contains("sq ft") {
            record.sqft = leading_token(&text).and_then(|t| t.parse().ok());
        } else if lower.contains("bd") || lower.contains("bed") {
            record.beds = leading_token(&text).and_then(|t| t.parse().ok());
        } else if lower.contains("ba") || lower.contains("bath") {
            record.baths = leading_token(&text)
                .and_then(|t| t.parse::<f64>().ok())
                .filter(|n| n.is_finite());
        }
    }

    record.url = card
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(absolute_url);

    Ok(record)
}

/// The zpid, from `data-zpid` or an `id` such as `zpid_12345`.
fn card_identifier(card: ElementRef<'_>) -> Option<String> {
    let element = card.value();
    element
        .attr("data-zpid")
        .or_else(|| element.id().map(|id| id.strip_prefix("zpid_").unwrap_or(id)))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Whole-dollar price, or `None` when the text isn't a plain amount.
pub fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '+'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// First token without thousands separators, e.g. `1500` from "1,500 sqft".
fn leading_token(text: &str) -> Option<String> {
    Some(text.split_whitespace().next()?.replace(',', ""))
}

fn absolute_url(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(SITE_ORIGIN).ok()?;
    base.join(href).ok().map(String::from)
}
