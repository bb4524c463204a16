use crate::models::PropertyRecord;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const FIELD_ID: &str = "MLS ID";
pub const FIELD_ADDRESS: &str = "Address";
pub const FIELD_PRICE: &str = "Price";
pub const FIELD_BEDS: &str = "Beds";
pub const FIELD_BATHS: &str = "Baths";
pub const FIELD_SQFT: &str = "Sqft";
pub const FIELD_URL: &str = "URL";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_LAST_SEEN: &str = "Last Seen";

/// One ZIP code maps to exactly one table.
pub fn table_name_for_zip(zip_code: &str) -> String {
    format!("ZIP_{}", zip_code)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Destination table definition, in the shape the metadata API accepts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub description: String,
    /// First field becomes the primary field
    pub fields: Vec<FieldSpec>,
}

impl TableSchema {
    /// Fixed listing schema, with the listing key as the primary field.
    pub fn for_zip(zip_code: &str) -> Self {
        let field = |name, kind, options| FieldSpec { name, kind, options };
        let whole_number = || Some(json!({ "precision": 0 }));

        Self {
            name: table_name_for_zip(zip_code),
            description: format!("Zillow listings for ZIP code {}", zip_code),
            fields: vec![
                field(FIELD_ID, "singleLineText", None),
                field(FIELD_ADDRESS, "singleLineText", None),
                field(FIELD_PRICE, "currency", Some(json!({ "precision": 0, "symbol": "$" }))),
                field(FIELD_BEDS, "number", whole_number()),
                field(FIELD_BATHS, "number", Some(json!({ "precision": 1 }))),
                field(FIELD_SQFT, "number", whole_number()),
                field(FIELD_URL, "url", None),
                field(FIELD_STATUS, "singleLineText", None),
                field(
                    FIELD_LAST_SEEN,
                    "dateTime",
                    Some(json!({
                        "timeZone": "utc",
                        "dateFormat": { "name": "iso" },
                        "timeFormat": { "name": "24hour" },
                    })),
                ),
            ],
        }
    }

    /// Field used to match incoming records against existing rows
    pub fn merge_key(&self) -> &'static str {
        FIELD_ID
    }
}

/// Record fields keyed by column name; absent values are left out so an
/// upsert never blanks a column.
pub fn record_fields(record: &PropertyRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FIELD_ID.to_string(), json!(record.identifier));

    let mut put = |name: &str, value: Option<Value>| {
        if let Some(value) = value {
            fields.insert(name.to_string(), value);
        }
    };
    put(FIELD_ADDRESS, record.address.as_ref().map(|v| json!(v)));
    put(FIELD_PRICE, record.price.map(|v| json!(v)));
    put(FIELD_BEDS, record.beds.map(|v| json!(v)));
    put(FIELD_BATHS, record.baths.map(|v| json!(v)));
    put(FIELD_SQFT, record.sqft.map(|v| json!(v)));
    put(FIELD_URL, record.url.as_ref().map(|v| json!(v)));
    put(FIELD_STATUS, record.status.as_ref().map(|v| json!(v)));
    put(FIELD_LAST_SEEN, record.last_seen.map(|v| json!(v.to_rfc3339())));

    fields
}
