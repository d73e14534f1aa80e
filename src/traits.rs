//! Collaborator seams for the ingestion pipeline.
//!
//! The pipeline never talks to S3, SQLite, or the system clock directly.
//! It is handed implementations of the traits below, which keeps the core
//! logic testable against in-memory doubles.
//!
//! # Architecture
//!
//! ```text
//!   event ──▶ ┌──────────────┐  head_size / get_bytes  ┌──────────────┐
//!             │  Ingestion   │────────────────────────▶│ ObjectStore  │
//!             │  Pipeline    │                         │ S3 / FS / mem│
//!             │              │  put(table, item)       ├──────────────┤
//!             │              │────────────────────────▶│ MetadataStore│
//!             └──────┬───────┘                         │ SQLite / mem │
//!                    │ now()                           └──────────────┘
//!                    ▼
//!                  Clock
//! ```
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use csv_metadata_ingest::models::FileLocator;
//! use csv_metadata_ingest::traits::ObjectStore;
//!
//! pub struct EmptyBucket;
//!
//! #[async_trait]
//! impl ObjectStore for EmptyBucket {
//!     fn name(&self) -> &str { "empty" }
//!
//!     async fn head_size(&self, locator: &FileLocator) -> Result<u64> {
//!         anyhow::bail!("no such object: {}", locator)
//!     }
//!
//!     async fn get_bytes(&self, locator: &FileLocator) -> Result<Vec<u8>> {
//!         anyhow::bail!("no such object: {}", locator)
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::{FileLocator, Item};

/// Read access to the object store that received the upload.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name used in log lines (e.g. `"s3"`).
    fn name(&self) -> &str;

    /// Size of the object in bytes, from a metadata-only lookup.
    ///
    /// Must not transfer the object body.
    async fn head_size(&self, locator: &FileLocator) -> Result<u64>;

    /// Full content of the object.
    async fn get_bytes(&self, locator: &FileLocator) -> Result<Vec<u8>>;
}

/// Key-value store receiving derived metadata.
///
/// Items are keyed by their `filename` attribute. A `put` for an existing
/// key replaces the stored item entirely.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or overwrite `item` in `table`.
    async fn put(&self, table: &str, item: &Item) -> Result<()>;

    /// Fetch the item stored under `key`, if any.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>>;

    /// All items in `table`, ordered by key.
    async fn list(&self, table: &str) -> Result<Vec<Item>>;
}

/// Source of the wall-clock time stamped onto metadata records.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The local system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
