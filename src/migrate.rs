use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::{is_valid_table_name, Config};
use crate::db;

/// Create the database file and the configured metadata table.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_table(&pool, &config.pipeline.table).await?;
    pool.close().await;
    Ok(())
}

/// Create a key-value table if it does not exist yet.
///
/// Every metadata table has the same shape: the item key, the full item as
/// JSON, and the unix time of the last write.
pub async fn ensure_table(pool: &SqlitePool, table: &str) -> Result<()> {
    if !is_valid_table_name(table) {
        bail!("invalid table name: '{}'", table);
    }

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            pk TEXT PRIMARY KEY,
            item_json TEXT NOT NULL,
            written_at INTEGER NOT NULL
        )
        "#,
        table
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{0}_written_at ON {0}(written_at DESC)",
        table
    ))
    .execute(pool)
    .await?;

    Ok(())
}
