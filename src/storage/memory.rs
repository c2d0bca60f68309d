//! In-memory storage units
//!
//! Modification times come from a counter that ticks on every write, so two
//! writes never share a timestamp however close together they land.

use super::{StorageBackend, UnitGuard, UnitLocks};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

struct Unit {
    text: String,
    modified: SystemTime,
}

/// Storage backend over an in-process map
#[derive(Default)]
pub struct MemoryBackend {
    units: RwLock<HashMap<String, Unit>>,
    clock: AtomicU64,
    locks: UnitLocks,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> SystemTime {
        let n = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        SystemTime::UNIX_EPOCH + Duration::from_micros(n)
    }

    /// Drop a unit entirely, as if its file had been deleted.
    pub async fn remove_unit(&self, unit_id: &str) -> bool {
        self.units.write().await.remove(unit_id).is_some()
    }

    pub async fn unit_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.units.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("clock", &self.clock.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read_buffer(&self, unit_id: &str) -> Result<String> {
        Ok(self
            .units
            .read()
            .await
            .get(unit_id)
            .map(|u| u.text.clone())
            .unwrap_or_default())
    }

    async fn write_buffer(&self, unit_id: &str, text: &str) -> Result<()> {
        let modified = self.tick();
        self.units.write().await.insert(
            unit_id.to_string(),
            Unit {
                text: text.to_string(),
                modified,
            },
        );
        Ok(())
    }

    async fn exists(&self, unit_id: &str) -> bool {
        self.units.read().await.contains_key(unit_id)
    }

    async fn modification_time(&self, unit_id: &str) -> Option<SystemTime> {
        self.units.read().await.get(unit_id).map(|u| u.modified)
    }

    async fn lock(&self, unit_id: &str) -> UnitGuard {
        self.locks.acquire(unit_id).await
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read_buffer("a").await.unwrap(), "");
        assert!(!backend.exists("a").await);

        backend.write_buffer("a", "text").await.unwrap();
        assert_eq!(backend.read_buffer("a").await.unwrap(), "text");
        assert!(backend.exists("a").await);
        assert_eq!(backend.unit_ids().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_every_write_advances_mtime() {
        let backend = MemoryBackend::new();
        backend.write_buffer("a", "one").await.unwrap();
        let first = backend.modification_time("a").await.unwrap();
        backend.write_buffer("a", "one").await.unwrap();
        let second = backend.modification_time("a").await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_remove_unit() {
        let backend = MemoryBackend::new();
        backend.write_buffer("a", "text").await.unwrap();
        assert!(backend.remove_unit("a").await);
        assert!(backend.modification_time("a").await.is_none());
        assert!(!backend.remove_unit("a").await);
    }
}
