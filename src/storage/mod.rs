//! Storage backends
//!
//! A storage unit is one text buffer identified by a string id. Backends
//! read and write whole buffers and hand out a per-unit exclusive lock that
//! the engine holds across every read-modify-write cycle.
//!
//! - [`FsBackend`]: one UTF-8 file per unit under a root directory
//! - [`MemoryBackend`]: in-process map, for tests and embedding

pub mod fs;
pub mod memory;

pub use fs::FsBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive write permit for one storage unit, released on drop
pub type UnitGuard = OwnedMutexGuard<()>;

/// Pluggable I/O collaborator.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Full contents of the unit; a unit that does not exist reads as empty.
    async fn read_buffer(&self, unit_id: &str) -> Result<String>;

    /// Replace the unit's contents, creating it if needed.
    async fn write_buffer(&self, unit_id: &str, text: &str) -> Result<()>;

    async fn exists(&self, unit_id: &str) -> bool;

    /// Last modification time, `None` when the unit does not exist.
    async fn modification_time(&self, unit_id: &str) -> Option<SystemTime>;

    /// Acquire the unit's exclusive write lock.
    async fn lock(&self, unit_id: &str) -> UnitGuard;

    /// Human-readable name for this backend (used in logs).
    fn name(&self) -> &str;
}

/// Per-unit lock table shared by the backends
#[derive(Debug, Default)]
pub(crate) struct UnitLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UnitLocks {
    /// Lock `unit_id`, first dropping idle entries of other units.
    ///
    /// An entry only the table references has no holder and no waiter:
    /// both keep a clone of the `Arc` until they are done with it.
    pub(crate) async fn acquire(&self, unit_id: &str) -> UnitGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(unit_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
