//! Airtable REST client: metadata API for tables, record API for upserts.

use crate::config::Settings;
use crate::models::PropertyRecord;
use crate::sync::schema::{record_fields, TableSchema};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.airtable.com";

/// Records accepted by a single upsert request
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

/// Pause between batch requests (5 requests/second per base)
const BATCH_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum TableApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    #[error("invalid API URL '{0}'")]
    InvalidUrl(String),
}

/// An upsert that stopped part way; `partial` counts the rows already written
#[derive(Debug, Error)]
#[error("{source} ({} records written before the failure)", .partial.processed())]
pub struct UpsertError {
    pub partial: UpsertSummary,
    #[source]
    pub source: TableApiError,
}

impl From<TableApiError> for UpsertError {
    fn from(source: TableApiError) -> Self {
        Self {
            partial: UpsertSummary::default(),
            source,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TableInfo {
    pub id: String,
    pub name: String,
}

/// Row counts reported back by an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub created: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }
}

/// The remote table operations the sync engine relies on
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<TableInfo>, TableApiError>;

    async fn create_table(&self, schema: &TableSchema) -> Result<TableInfo, TableApiError>;

    /// Insert-or-update `records`, matching existing rows on `merge_on`
    async fn upsert_records(
        &self,
        table: &str,
        merge_on: &str,
        records: &[PropertyRecord],
    ) -> Result<UpsertSummary, UpsertError>;
}

#[derive(Deserialize)]
struct ListTablesResponse {
    tables: Vec<TableInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    created_records: Vec<String>,
    #[serde(default)]
    updated_records: Vec<String>,
}

/// Airtable client bound to one base
pub struct AirtableClient {
    client: Client,
    api_url: Url,
    base_id: String,
    access_token: String,
}

impl AirtableClient {
    pub fn new(settings: &Settings) -> Result<Self, TableApiError> {
        Self::with_api_url(settings, DEFAULT_API_URL)
    }

    /// Point the client at another host (a local stand-in in tests)
    pub fn with_api_url(settings: &Settings, api_url: &str) -> Result<Self, TableApiError> {
        let api_url = Url::parse(api_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| TableApiError::InvalidUrl(api_url.to_string()))?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_url,
            base_id: settings.base_id.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    /// API URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TableApiError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| TableApiError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn tables_url(&self) -> Result<Url, TableApiError> {
        self.endpoint(&["v0", "meta", "bases", self.base_id.as_str(), "tables"])
    }

    fn records_url(&self, table: &str) -> Result<Url, TableApiError> {
        self.endpoint(&["v0", self.base_id.as_str(), table])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TableApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TableApiError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TableApi for AirtableClient {
    async fn list_tables(&self) -> Result<Vec<TableInfo>, TableApiError> {
        let response: ListTablesResponse = self
            .send(self.request(Method::GET, self.tables_url()?))
            .await?;
        debug!("Base {} has {} tables", self.base_id, response.tables.len());
        Ok(response.tables)
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<TableInfo, TableApiError> {
        let request = self.request(Method::POST, self.tables_url()?).json(schema);
        match self.send(request).await {
            Err(TableApiError::Status { status, body })
                if status == StatusCode::UNPROCESSABLE_ENTITY
                    && body.contains("DUPLICATE_TABLE_NAME") =>
            {
                Err(TableApiError::DuplicateTable(schema.name.clone()))
            }
            other => other,
        }
    }

    async fn upsert_records(
        &self,
        table: &str,
        merge_on: &str,
        records: &[PropertyRecord],
    ) -> Result<UpsertSummary, UpsertError> {
        let url = self.records_url(table)?;
        let mut summary = UpsertSummary::default();

        for (idx, chunk) in records.chunks(MAX_RECORDS_PER_REQUEST).enumerate() {
            if idx > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let payload = json!({
                "performUpsert": { "fieldsToMergeOn": [merge_on] },
                "typecast": true,
                "records": chunk
                    .iter()
                    .map(|record| json!({ "fields": record_fields(record) }))
                    .collect::<Vec<_>>(),
            });

            let response: UpsertResponse = match self
                .send(self.request(Method::PATCH, url.clone()).json(&payload))
                .await
            {
                Ok(response) => response,
                Err(source) => {
                    return Err(UpsertError {
                        partial: summary,
                        source,
                    })
                }
            };

            debug!(
                "Upsert batch {}: {} created, {} updated",
                idx + 1,
                response.created_records.len(),
                response.updated_records.len()
            );
            summary.created += response.created_records.len();
            summary.updated += response.updated_records.len();
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, patch};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recorded {
        requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
        /// Upsert requests from this one (1-based) on answer 503
        fail_upsert_from: Option<usize>,
    }

    impl Recorded {
        fn push(&self, what: String, headers: &HeaderMap, body: Value) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.requests.lock().unwrap().push((what, auth, body));
        }
    }

    async fn list(
        State(rec): State<Recorded>,
        Path(base): Path<String>,
        headers: HeaderMap,
    ) -> Json<Value> {
        rec.push(format!("list {base}"), &headers, Value::Null);
        Json(json!({ "tables": [{ "id": "tbl1", "name": "ZIP_90210", "fields": [] }] }))
    }

    async fn create(
        State(rec): State<Recorded>,
        Path(base): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        rec.push(format!("create {base}"), &headers, body.clone());
        if body["name"] == "ZIP_90210" {
            return (
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": { "type": "DUPLICATE_TABLE_NAME" } })),
            );
        }
        (
            axum::http::StatusCode::OK,
            Json(json!({ "id": "tbl2", "name": body["name"] })),
        )
    }

    async fn upsert(
        State(rec): State<Recorded>,
        Path((base, table)): Path<(String, String)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        rec.push(format!("upsert {base}/{table}"), &headers, body.clone());
        let attempt = rec
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.0.starts_with("upsert"))
            .count();
        if rec.fail_upsert_from.is_some_and(|from| attempt >= from) {
            return (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "try again later" })),
            );
        }
        let ids: Vec<String> = body["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| format!("rec{}", r["fields"]["MLS ID"].as_str().unwrap()))
            .collect();
        (
            axum::http::StatusCode::OK,
            Json(json!({ "records": [], "createdRecords": ids, "updatedRecords": [] })),
        )
    }

    async fn stand_in() -> (AirtableClient, Recorded) {
        stand_in_with(Recorded::default()).await
    }

    async fn stand_in_with(recorded: Recorded) -> (AirtableClient, Recorded) {
        let router = Router::new()
            .route("/v0/meta/bases/:base/tables", get(list).post(create))
            .route("/v0/:base/:table", patch(upsert))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let settings = Settings {
            access_token: "patTEST".to_string(),
            base_id: "appXYZ".to_string(),
            zip_code: "90210".to_string(),
        };
        let client = AirtableClient::with_api_url(&settings, &format!("http://{addr}/")).unwrap();
        (client, recorded)
    }

    #[tokio::test]
    async fn lists_tables_with_bearer_token() {
        let (client, recorded) = stand_in().await;

        let tables = client.list_tables().await.unwrap();
        assert_eq!(tables, vec![TableInfo { id: "tbl1".into(), name: "ZIP_90210".into() }]);

        let requests = recorded.requests.lock().unwrap();
        assert_eq!(requests[0].0, "list appXYZ");
        assert_eq!(requests[0].1.as_deref(), Some("Bearer patTEST"));
    }

    #[tokio::test]
    async fn create_table_sends_schema_and_maps_duplicates() {
        let (client, recorded) = stand_in().await;

        let created = client.create_table(&TableSchema::for_zip("10001")).await.unwrap();
        assert_eq!(created.name, "ZIP_10001");

        let duplicate = client.create_table(&TableSchema::for_zip("90210")).await;
        assert!(matches!(duplicate, Err(TableApiError::DuplicateTable(name)) if name == "ZIP_90210"));

        let requests = recorded.requests.lock().unwrap();
        assert_eq!(requests[0].2["fields"][0]["name"], "MLS ID");
    }

    #[tokio::test]
    async fn upsert_splits_into_batches_of_ten() {
        let (client, recorded) = stand_in().await;
        let records: Vec<_> = (0..23).map(|i| PropertyRecord::new(format!("Z{i}"))).collect();

        let summary = client.upsert_records("ZIP_90210", "MLS ID", &records).await.unwrap();
        assert_eq!(summary, UpsertSummary { created: 23, updated: 0 });

        let requests = recorded.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].0, "upsert appXYZ/ZIP_90210");
        assert_eq!(requests[0].2["performUpsert"]["fieldsToMergeOn"][0], "MLS ID");
        let sizes: Vec<_> = requests
            .iter()
            .map(|r| r.2["records"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn failed_chunk_keeps_earlier_counts() {
        let (client, recorded) = stand_in_with(Recorded {
            fail_upsert_from: Some(2),
            ..Recorded::default()
        })
        .await;
        let records: Vec<_> = (0..15).map(|i| PropertyRecord::new(format!("Z{i}"))).collect();

        let err = client
            .upsert_records("ZIP_90210", "MLS ID", &records)
            .await
            .unwrap_err();
        assert_eq!(err.partial, UpsertSummary { created: 10, updated: 0 });
        assert!(matches!(err.source, TableApiError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(recorded.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sync_counts_rows_written_before_a_failed_chunk() {
        let (client, _recorded) = stand_in_with(Recorded {
            fail_upsert_from: Some(2),
            ..Recorded::default()
        })
        .await;
        let records: Vec<_> = (0..15).map(|i| PropertyRecord::new(format!("Z{i}"))).collect();

        let report = crate::sync::SyncEngine::new(&client).sync(records, "90210").await;

        assert!(report.success());
        assert_eq!(report.processed, 10);
        assert!(!report.created_table);
    }

    #[test]
    fn table_names_are_encoded_as_one_segment() {
        let settings = Settings {
            base_id: "appXYZ".to_string(),
            ..Settings::default()
        };
        let client = AirtableClient::with_api_url(&settings, "https://api.airtable.com/").unwrap();

        assert_eq!(
            client.records_url("ZIP_90210").unwrap().as_str(),
            "https://api.airtable.com/v0/appXYZ/ZIP_90210"
        );
        assert_eq!(
            client.records_url("My Table/2").unwrap().as_str(),
            "https://api.airtable.com/v0/appXYZ/My%20Table%2F2"
        );
        assert_eq!(
            client.tables_url().unwrap().as_str(),
            "https://api.airtable.com/v0/meta/bases/appXYZ/tables"
        );
    }

    #[test]
    fn rejects_unusable_api_urls() {
        let settings = Settings::default();
        assert!(matches!(
            AirtableClient::with_api_url(&settings, "mailto:someone@example.com"),
            Err(TableApiError::InvalidUrl(_))
        ));
        assert!(AirtableClient::with_api_url(&settings, "not a url").is_err());
    }
}
