pub mod airtable;
pub mod engine;
pub mod schema;

pub use airtable::{AirtableClient, TableApi};
pub use engine::{SyncEngine, SyncReport};
