//! File storage backend
//!
//! One pretty-printed JSON file per record at `<data_dir>/<kind>/<id>.json`.
//! Writes go to a temporary file that is renamed over the target.

use super::backend::{EntityKey, EntityKind, StorageBackend};
use super::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    /// Create the backend, creating one directory per record kind
    pub fn new(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        for kind in EntityKind::ALL {
            std::fs::create_dir_all(base_path.join(kind.as_str()))?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, key: &EntityKey) -> StoreResult<PathBuf> {
        let valid = !key.id.is_empty()
            && key
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Backend(format!(
                "invalid record id '{}'",
                key.id
            )));
        }
        Ok(self
            .base_path
            .join(key.kind.as_str())
            .join(format!("{}.{}", key.id, EXTENSION)))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn read(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &EntityKey, data: Vec<u8>) -> StoreResult<()> {
        let path = self.record_path(key)?;
        let temp_path = path.with_extension("tmp");

        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(path = %path.display(), "Wrote record");
        Ok(())
    }

    async fn remove(&self, key: &EntityKey) -> StoreResult<bool> {
        let path = self.record_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, kind: EntityKind) -> StoreResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.base_path.join(kind.as_str())).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}
