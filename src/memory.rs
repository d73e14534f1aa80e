//! In-memory [`ObjectStore`] and [`MetadataStore`] implementations.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety. Intended for
//! tests and for embedding the pipeline where no external store exists.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{item_key, FileLocator, Item};
use crate::traits::{MetadataStore, ObjectStore};

/// Object store holding byte buffers keyed by locator.
///
/// Counts calls to each operation so tests can assert which stages ran.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<FileLocator, Vec<u8>>>,
    /// Sizes reported by `head_size` instead of the buffer length.
    size_overrides: RwLock<HashMap<FileLocator, u64>>,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: FileLocator, bytes: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(locator, bytes.into());
    }

    /// Make `head_size` report `size` for `locator`, whatever its content.
    pub fn set_reported_size(&self, locator: FileLocator, size: u64) {
        self.size_overrides.write().unwrap().insert(locator, size);
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn head_size(&self, locator: &FileLocator) -> Result<u64> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(size) = self.size_overrides.read().unwrap().get(locator) {
            return Ok(*size);
        }
        self.objects
            .read()
            .unwrap()
            .get(locator)
            .map(|b| b.len() as u64)
            .ok_or_else(|| anyhow!("NoSuchKey: {}", locator))
    }

    async fn get_bytes(&self, locator: &FileLocator) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: {}", locator))
    }
}

/// Metadata store holding items per table, keyed by `filename`.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Item>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, table: &str, item: &Item) -> Result<()> {
        let key = item_key(item)?;
        let mut tables = self.tables.write().unwrap();
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key, item.clone());
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn list(&self, table: &str) -> Result<Vec<Item>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}
