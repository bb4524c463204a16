use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single listing card as scraped from the search results page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyRecord {
    /// Listing key (zpid), used as the upsert key downstream
    pub identifier: String,
    pub address: Option<String>,
    /// Whole currency units
    pub price: Option<i64>,
    pub beds: Option<i32>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub url: Option<String>,
    pub status: Option<String>,
    /// Set by the sync engine right before the upsert
    pub last_seen: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    /// Create a record carrying only its listing key
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Blank identifiers count as missing.
    pub fn has_identifier(&self) -> bool {
        !self.identifier.trim().is_empty()
    }
}
