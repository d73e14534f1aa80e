//! SQLite-backed [`MetadataStore`] implementation.
//!
//! Each logical table is a SQLite table created by
//! [`migrate::ensure_table`](crate::migrate::ensure_table). Items are stored
//! whole as JSON under their `filename` key; a second `put` for the same key
//! replaces the row in a single upsert statement.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::config::is_valid_table_name;
use crate::models::{item_key, Item};
use crate::traits::MetadataStore;

pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn checked_table(table: &str) -> Result<&str> {
    if !is_valid_table_name(table) {
        bail!("invalid table name: '{}'", table);
    }
    Ok(table)
}

fn decode_item(json: &str) -> Result<Item> {
    serde_json::from_str(json).context("stored item is not a JSON object")
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, table: &str, item: &Item) -> Result<()> {
        let table = checked_table(table)?;
        let key = item_key(item)?;
        let item_json = serde_json::to_string(item)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (pk, item_json, written_at) VALUES (?, ?, ?)
            ON CONFLICT(pk) DO UPDATE SET
                item_json = excluded.item_json,
                written_at = excluded.written_at
            "#,
            table
        ))
        .bind(&key)
        .bind(&item_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("put into '{}' failed", table))?;

        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>> {
        let table = checked_table(table)?;
        let json: Option<String> =
            sqlx::query_scalar(&format!("SELECT item_json FROM {} WHERE pk = ?", table))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        json.as_deref().map(decode_item).transpose()
    }

    async fn list(&self, table: &str) -> Result<Vec<Item>> {
        let table = checked_table(table)?;
        let rows: Vec<String> =
            sqlx::query_scalar(&format!("SELECT item_json FROM {} ORDER BY pk", table))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|json| decode_item(json)).collect()
    }
}
