//! Stored metadata lookup.
//!
//! Reads records back out of the SQLite metadata table. Used by the
//! `csvmeta get` / `csvmeta list` commands and the `GET /metadata` endpoint.

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::db;
use crate::models::{Item, MetadataRecord};
use crate::sqlite_store::SqliteMetadataStore;
use crate::traits::MetadataStore;

fn to_record(item: Item) -> Result<MetadataRecord> {
    MetadataRecord::from_item(item).context("stored item is not a metadata record")
}

/// Fetch one record by filename, if it was ever stored.
pub async fn find_record(
    store: &dyn MetadataStore,
    table: &str,
    filename: &str,
) -> Result<Option<MetadataRecord>> {
    store.get(table, filename).await?.map(to_record).transpose()
}

/// All records in `table`, ordered by filename.
pub async fn list_records(store: &dyn MetadataStore, table: &str) -> Result<Vec<MetadataRecord>> {
    store
        .list(table)
        .await?
        .into_iter()
        .map(to_record)
        .collect()
}

pub async fn run_get(config: &Config, filename: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteMetadataStore::new(pool);

    let record = find_record(&store, &config.pipeline.table, filename).await;
    store.pool().close().await;

    match record? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("no metadata stored for: {}", filename),
    }
}

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteMetadataStore::new(pool);

    let records = list_records(&store, &config.pipeline.table).await;
    store.pool().close().await;
    let records = records?;

    println!("{} ({} records)", config.pipeline.table, records.len());
    for r in &records {
        println!(
            "  {}  rows={}  columns={}  bytes={}  at {}",
            r.filename, r.row_count, r.column_count, r.file_size_bytes, r.upload_timestamp
        );
    }
    Ok(())
}
