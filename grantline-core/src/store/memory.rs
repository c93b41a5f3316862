//! In-memory storage backend
//!
//! Clones share the same records, so several engines in one process can
//! act as separate cluster nodes over one "database". Failure and latency
//! injection exist for exercising the gateway's failure paths.

use super::backend::{EntityKey, EntityKind, StorageBackend};
use super::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<BTreeMap<EntityKey, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every write by `delay`
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of stored records of `kind`
    pub async fn count(&self, kind: EntityKind) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|key| key.kind == kind)
            .count()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("memory backend set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &EntityKey, data: Vec<u8>) -> StoreResult<()> {
        self.check_available()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.records.write().await.insert(key.clone(), data);
        Ok(())
    }

    async fn remove(&self, key: &EntityKey) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list(&self, kind: EntityKind) -> StoreResult<Vec<String>> {
        self.check_available()?;
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|key| key.kind == kind)
            .map(|key| key.id.clone())
            .collect())
    }
}
