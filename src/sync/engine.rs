use crate::models::PropertyRecord;
use crate::sync::airtable::{TableApi, TableApiError};
use crate::sync::schema::{table_name_for_zip, TableSchema};
use chrono::Utc;
use tracing::{error, info, warn};

/// Where a sync stopped, if it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailure {
    ListTables,
    CreateTable,
    Upsert,
    NothingProcessed,
}

/// Outcome of one sync call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub table: String,
    pub created_table: bool,
    /// Records dropped for lacking an identifier
    pub filtered: usize,
    pub processed: usize,
    pub failure: Option<SyncFailure>,
}

impl SyncReport {
    fn new(table: String) -> Self {
        Self {
            table,
            created_table: false,
            filtered: 0,
            processed: 0,
            failure: None,
        }
    }

    fn failed(mut self, failure: SyncFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Ensures the ZIP table exists and upserts listings into it
pub struct SyncEngine<'a> {
    api: &'a dyn TableApi,
}

impl<'a> SyncEngine<'a> {
    pub fn new(api: &'a dyn TableApi) -> Self {
        Self { api }
    }

    pub async fn sync(&self, records: Vec<PropertyRecord>, zip_code: &str) -> SyncReport {
        let schema = TableSchema::for_zip(zip_code);
        let mut report = SyncReport::new(table_name_for_zip(zip_code));

        let tables = match self.api.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                error!("Could not list tables while syncing '{}': {}", report.table, e);
                return report.failed(SyncFailure::ListTables);
            }
        };

        if tables.iter().any(|t| t.name == report.table) {
            info!("Table '{}' already exists", report.table);
        } else {
            info!("Table '{}' not found, creating it", report.table);
            match self.api.create_table(&schema).await {
                Ok(table) => {
                    info!("Created table '{}' ({})", table.name, table.id);
                    report.created_table = true;
                }
                Err(TableApiError::DuplicateTable(_)) => {
                    info!("Table '{}' was created concurrently, reusing it", report.table);
                }
                Err(e) => {
                    error!("Failed to create table '{}': {}", report.table, e);
                    return report.failed(SyncFailure::CreateTable);
                }
            }
        }

        let seen_at = Utc::now();
        let total = records.len();
        let valid: Vec<PropertyRecord> = records
            .into_iter()
            .map(|mut record| {
                record.last_seen = Some(seen_at);
                record
            })
            .filter(PropertyRecord::has_identifier)
            .collect();
        report.filtered = total - valid.len();

        if report.filtered > 0 {
            warn!("Dropped {} records without an identifier", report.filtered);
        }
        if valid.is_empty() {
            info!("No valid records to send to '{}'", report.table);
            return report;
        }

        info!("Upserting {} records into '{}'", valid.len(), report.table);
        match self
            .api
            .upsert_records(&report.table, schema.merge_key(), &valid)
            .await
        {
            Ok(summary) => {
                report.processed = summary.processed();
                info!(
                    "Upserted into '{}': {} created, {} updated",
                    report.table, summary.created, summary.updated
                );
                if report.processed == 0 {
                    error!("Upsert into '{}' processed no records", report.table);
                    return report.failed(SyncFailure::NothingProcessed);
                }
                report
            }
            Err(e) if e.partial.processed() > 0 => {
                report.processed = e.partial.processed();
                warn!(
                    "Upsert into '{}' stopped part way: {}",
                    report.table, e
                );
                report
            }
            Err(e) => {
                error!("Upsert into '{}' failed: {}", report.table, e);
                report.failed(SyncFailure::Upsert)
            }
        }
    }
}
