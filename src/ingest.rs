//! Command-level orchestration.
//!
//! Builds the configured collaborators, wires them into an
//! [`IngestPipeline`], and runs it for the `process` and `invoke` commands.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::fs_store::FsObjectStore;
use crate::migrate;
use crate::models::{FileLocator, InvocationResponse};
use crate::pipeline::{event_error_response, IngestPipeline, PipelineOptions};
use crate::s3::S3ObjectStore;
use crate::sqlite_store::SqliteMetadataStore;
use crate::traits::ObjectStore;

/// Instantiate the object store named by `[object_store].provider`.
pub fn build_object_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let store_config = &config.object_store;
    match store_config.provider.as_str() {
        "s3" => Ok(Arc::new(S3ObjectStore::from_config(store_config)?)),
        "filesystem" => {
            let root = store_config
                .root
                .clone()
                .context("object_store.root is required for the filesystem provider")?;
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        other => bail!("Unknown object store provider: '{}'", other),
    }
}

/// Connect to SQLite, make sure the metadata table exists, and build the
/// pipeline around the configured object store.
pub async fn build_pipeline(config: &Config) -> Result<IngestPipeline> {
    let objects = build_object_store(config)?;

    let pool = db::connect(config).await?;
    migrate::ensure_table(&pool, &config.pipeline.table).await?;
    let metadata = Arc::new(SqliteMetadataStore::new(pool));

    Ok(IngestPipeline::new(
        objects,
        metadata,
        PipelineOptions::from_config(config),
    ))
}

/// Run the pipeline for one bucket/key pair.
pub async fn run_process(config: &Config, bucket: &str, key: &str) -> Result<InvocationResponse> {
    let pipeline = Arc::new(build_pipeline(config).await?);
    Ok(pipeline.invoke_locator(FileLocator::new(bucket, key)).await)
}

/// Run the pipeline for an event notification read from `path` (`-` for stdin).
pub async fn run_invoke(config: &Config, path: &Path) -> Result<InvocationResponse> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?
    };

    let event: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(event) => event,
        Err(e) => {
            return Ok(event_error_response(
                anyhow::Error::new(e).context("Event file is not valid JSON"),
            ))
        }
    };

    let pipeline = Arc::new(build_pipeline(config).await?);
    Ok(pipeline.invoke(event).await)
}

/// Print the Lambda-style envelope and report whether the invocation succeeded.
pub fn print_response(response: &InvocationResponse) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(&response.to_envelope())?);
    Ok(response.status_code == 200)
}
