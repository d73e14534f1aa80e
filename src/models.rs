//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the object being ingested, the parsed table shape,
//! the derived metadata record, and the invocation result handed back to
//! whatever triggered the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies a stored object: the bucket (container) and the object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocator {
    pub bucket: String,
    pub key: String,
}

impl FileLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Parsed shape of a delimited file.
///
/// Only the header and the number of data rows are retained; cell contents
/// are dropped as soon as a row has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularDataset {
    /// Column names in header order. Always unique.
    pub columns: Vec<String>,
    /// Number of data rows (header excluded).
    pub row_count: usize,
}

impl TabularDataset {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A flat attribute map handed to a [`MetadataStore`](crate::traits::MetadataStore).
pub type Item = Map<String, Value>;

/// The string value of an item's key attribute (`filename`).
pub fn item_key(item: &Item) -> anyhow::Result<String> {
    item.get(MetadataRecord::KEY_ATTRIBUTE)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "item is missing string key attribute '{}'",
                MetadataRecord::KEY_ATTRIBUTE
            )
        })
}

/// Summary document persisted for every successfully processed file.
///
/// Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub filename: String,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub upload_timestamp: String,
    pub file_size_bytes: u64,
    pub row_count: u64,
    pub column_count: u64,
    pub column_names: Vec<String>,
}

impl MetadataRecord {
    /// Name of the attribute that keys the record in the store.
    pub const KEY_ATTRIBUTE: &'static str = "filename";

    /// Flatten into a store item.
    pub fn to_item(&self) -> Item {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of scalars and a string list always serializes to an object.
            _ => Item::new(),
        }
    }

    /// Rebuild a record from a stored item.
    pub fn from_item(item: Item) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(item))
    }
}

/// Terminal result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Metadata was derived and stored.
    Success(MetadataRecord),
    /// The input itself was unacceptable (oversize, unparseable).
    Rejected(String),
    /// The environment failed (store unreachable, object missing, bad event).
    Failed(String),
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success(_) => 200,
            Outcome::Rejected(_) => 400,
            Outcome::Failed(_) => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Message returned alongside the metadata on success.
pub const SUCCESS_MESSAGE: &str = "CSV file processed successfully";

/// Response body of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success {
        message: String,
        metadata: MetadataRecord,
    },
    Error {
        error: String,
    },
}

/// Status code plus structured body, as returned to the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl InvocationResponse {
    /// Lambda-style envelope: `{"statusCode": …, "body": "<json string>"}`.
    pub fn to_envelope(&self) -> Value {
        let body = serde_json::to_string(&self.body).unwrap_or_default();
        serde_json::json!({
            "statusCode": self.status_code,
            "body": body,
        })
    }
}

impl From<Outcome> for InvocationResponse {
    fn from(outcome: Outcome) -> Self {
        let status_code = outcome.status_code();
        let body = match outcome {
            Outcome::Success(metadata) => ResponseBody::Success {
                message: SUCCESS_MESSAGE.to_string(),
                metadata,
            },
            Outcome::Rejected(error) | Outcome::Failed(error) => ResponseBody::Error { error },
        };
        Self { status_code, body }
    }
}
