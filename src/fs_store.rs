//! Local-directory object store.
//!
//! Maps a locator to `<root>/<bucket>/<key>`. Handy for running the
//! pipeline without an S3 endpoint.
//!
//! ```toml
//! [object_store]
//! provider = "filesystem"
//! root = "./objects"
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::models::FileLocator;
use crate::traits::ObjectStore;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a locator to a path under the root.
    ///
    /// Bucket and key must be relative and free of `..` segments.
    pub fn resolve(&self, locator: &FileLocator) -> Result<PathBuf> {
        let bucket = Path::new(&locator.bucket);
        let key = Path::new(&locator.key);
        for part in [bucket, key] {
            if part.as_os_str().is_empty()
                || part
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
            {
                bail!("refusing to resolve {} outside of {}", locator, self.root.display());
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn head_size(&self, locator: &FileLocator) -> Result<u64> {
        let path = self.resolve(locator)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("no such object: {}", locator))?;
        if !meta.is_file() {
            bail!("not a file: {}", path.display());
        }
        Ok(meta.len())
    }

    async fn get_bytes(&self, locator: &FileLocator) -> Result<Vec<u8>> {
        let path = self.resolve(locator)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }
}
