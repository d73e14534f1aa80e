//! Object-created event notifications.
//!
//! Decodes the S3 event-notification JSON shape:
//!
//! ```json
//! {
//!   "Records": [
//!     { "s3": { "bucket": { "name": "uploads" }, "object": { "key": "data/sample.csv" } } }
//!   ]
//! }
//! ```
//!
//! Only the first record is turned into a [`FileLocator`]; any further
//! records in the same notification are ignored.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::FileLocator;

#[derive(Debug, Deserialize)]
pub struct EventNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

impl EventNotification {
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).context("malformed event notification")
    }

    /// Locator for the first record.
    pub fn first_locator(&self) -> Result<FileLocator> {
        let record = self
            .records
            .first()
            .context("event notification contains no records")?;
        Ok(FileLocator::new(
            record.s3.bucket.name.clone(),
            record.s3.object.key.clone(),
        ))
    }
}

/// Decode a notification and return the locator of its first record.
pub fn locator_from_event(value: &serde_json::Value) -> Result<FileLocator> {
    EventNotification::from_json(value)?.first_locator()
}
