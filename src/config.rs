use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pipeline::{DEFAULT_MAX_FILE_SIZE, DEFAULT_TABLE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}
fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    /// `"s3"` or `"filesystem"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint (LocalStack, MinIO). Switches to path-style URLs.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Root directory for the filesystem provider: `<root>/<bucket>/<key>`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_provider() -> String {
    "s3".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9400".to_string()
}

/// True for names usable as a bare SQLite table identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.pipeline.max_file_size_bytes == 0 {
        bail!("pipeline.max_file_size_bytes must be > 0");
    }

    if !is_valid_table_name(&config.pipeline.table) {
        bail!(
            "pipeline.table must contain only ASCII letters, digits and '_' (got '{}')",
            config.pipeline.table
        );
    }

    match config.object_store.provider.as_str() {
        "s3" => {}
        "filesystem" => {
            if config.object_store.root.is_none() {
                bail!("object_store.root must be set when provider is 'filesystem'");
            }
        }
        other => bail!(
            "Unknown object store provider: '{}'. Must be s3 or filesystem.",
            other
        ),
    }

    Ok(config)
}
