//! MemoLog engine
//!
//! Composes a storage backend with the pure memo store, the parsed-list
//! cache and the thread index cache. Every mutation runs
//! read → compute → write under the unit's lock and then drops all cached
//! state derived from that unit before the lock is released.

use crate::cache::{CacheKey, CacheStats, MemoCache, DEFAULT_CAPACITY};
use crate::config::MemoLogConfig;
use crate::error::{Error, Result};
use crate::memo::{
    cascade, now_timestamp, InsertOrder, MemoBuilder, MemoRecord, MemoStore, ThreadIndex,
    ThreadIndexCache,
};
use crate::storage::{FsBackend, StorageBackend};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Memo log over one storage backend
pub struct MemoLog {
    backend: Arc<dyn StorageBackend>,
    store: MemoStore,
    order: InsertOrder,
    retention_days: u32,
    cache: Mutex<MemoCache>,
    threads: Mutex<ThreadIndexCache>,
}

impl MemoLog {
    /// Build an engine over plain files as described by `config`.
    pub fn from_config(config: &MemoLogConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = MemoLogBuilder::new()
            .backend(Arc::new(FsBackend::new(config.storage.root_dir.clone())))
            .todo_mode(config.format.todo_mode)
            .insert_order(config.format.insert_order)
            .retention_days(config.trash.retention_days)
            .cache_capacity(config.cache.capacity);
        if let Some(template) = &config.format.default_template {
            builder = builder.default_template(template.clone());
        }
        builder.build()
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn store(&self) -> &MemoStore {
        &self.store
    }

    pub fn insert_order(&self) -> InsertOrder {
        self.order
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Records of `category` (empty = all) in file order.
    pub async fn list(&self, unit_id: &str, category: &str) -> Result<Arc<Vec<MemoRecord>>> {
        let key = CacheKey::new(unit_id, category);

        // Sampled before the read: a concurrent write makes the tag stale, never the data
        let mtime = self.backend.modification_time(unit_id).await;
        if let Some(hit) = self.cache.lock().await.get_memos(&key, mtime) {
            tracing::debug!("Cache hit for {}", key);
            return Ok(hit);
        }

        tracing::debug!("Cache miss for {}, reading {}", key, unit_id);
        // Thread indexes built from the old contents are stale too
        self.threads.lock().await.invalidate_unit(unit_id);

        if mtime.is_none() {
            return Ok(Arc::new(Vec::new()));
        }
        let buffer = self.backend.read_buffer(unit_id).await?;
        let records = self.store.list(&buffer, category);
        Ok(self.cache.lock().await.set_memos(key, records, mtime))
    }

    /// A single record by id.
    pub async fn get(&self, unit_id: &str, id: &str) -> Result<Option<MemoRecord>> {
        let records = self.list(unit_id, "").await?;
        Ok(records.iter().find(|memo| memo.id == id).cloned())
    }

    /// Reply tree over the records of `category` (empty = all).
    pub async fn thread_index(&self, unit_id: &str, category: &str) -> Result<Arc<ThreadIndex>> {
        let records = self.list(unit_id, category).await?;
        let key = CacheKey::new(unit_id, category);
        Ok(self.threads.lock().await.get_or_build(&key, &records))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a new memo.
    pub async fn add(&self, unit_id: &str, memo: MemoBuilder) -> Result<MemoRecord> {
        let record = memo.build()?;
        let store = &self.store;
        let order = self.order;
        self.mutate(unit_id, "Added memo", &record.id, |buffer| {
            Ok(Some((store.append(buffer, &record, order), ())))
        })
        .await?;
        Ok(record)
    }

    /// Append a reply to `parent_id`, inheriting its category.
    pub async fn add_reply(
        &self,
        unit_id: &str,
        parent_id: &str,
        reply: MemoBuilder,
        category: Option<&str>,
    ) -> Result<MemoRecord> {
        let store = &self.store;
        let order = self.order;
        self.mutate(unit_id, "Added reply to", parent_id, |buffer| {
            let (next, record) =
                cascade::add_reply(store, buffer, parent_id, reply, category, order)?;
            Ok(Some((next, record)))
        })
        .await?
        .ok_or_else(|| Error::Internal(format!("reply to {} was not written", parent_id)))
    }

    /// Replace the body of `id`.
    pub async fn update_content(&self, unit_id: &str, id: &str, content: &str) -> Result<bool> {
        let store = &self.store;
        let done = self
            .mutate(unit_id, "Updated memo", id, |buffer| {
                ensure_not_permanently_deleted(store, buffer, id)?;
                Ok(store
                    .update(buffer, id, |_| content.to_string())
                    .map(|next| (next, ())))
            })
            .await?;
        Ok(done.is_some())
    }

    /// Move `id` to the trash.
    pub async fn trash(&self, unit_id: &str, id: &str) -> Result<bool> {
        let store = &self.store;
        let now = now_timestamp();
        let done = self
            .mutate(unit_id, "Trashed memo", id, |buffer| {
                ensure_not_permanently_deleted(store, buffer, id)?;
                Ok(store.move_to_trash(buffer, id, &now).map(|next| (next, ())))
            })
            .await?;
        Ok(done.is_some())
    }

    /// Take `id` out of the trash. `Ok(false)` if it was not trashed.
    pub async fn restore(&self, unit_id: &str, id: &str) -> Result<bool> {
        let store = &self.store;
        let done = self
            .mutate(unit_id, "Restored memo", id, |buffer| {
                ensure_not_permanently_deleted(store, buffer, id)?;
                Ok(store.restore(buffer, id).map(|next| (next, ())))
            })
            .await?;
        Ok(done.is_some())
    }

    /// Restore `id` and its trashed descendants; returns the restored ids.
    pub async fn restore_with_descendants(
        &self,
        unit_id: &str,
        id: &str,
    ) -> Result<Option<Vec<String>>> {
        let store = &self.store;
        self.mutate(unit_id, "Restored thread", id, |buffer| {
            Ok(cascade::restore_with_descendants(store, buffer, id)?
                .map(|outcome| (outcome.buffer, outcome.affected)))
        })
        .await
    }

    /// Delete `id` and its replies; returns the affected ids.
    pub async fn delete_with_descendants(
        &self,
        unit_id: &str,
        id: &str,
    ) -> Result<Option<Vec<String>>> {
        let store = &self.store;
        self.mutate(unit_id, "Deleted thread", id, |buffer| {
            Ok(cascade::delete_with_descendants(store, buffer, id)
                .map(|outcome| (outcome.buffer, outcome.affected)))
        })
        .await
    }

    /// Hard-remove the block of `id`, ignoring replies.
    pub async fn remove(&self, unit_id: &str, id: &str) -> Result<bool> {
        let store = &self.store;
        let done = self
            .mutate(unit_id, "Removed memo", id, |buffer| {
                Ok(store.remove(buffer, id).map(|next| (next, ())))
            })
            .await?;
        Ok(done.is_some())
    }

    pub async fn pin(&self, unit_id: &str, id: &str) -> Result<bool> {
        self.set_pinned(unit_id, id, Some(now_timestamp())).await
    }

    pub async fn unpin(&self, unit_id: &str, id: &str) -> Result<bool> {
        self.set_pinned(unit_id, id, None).await
    }

    async fn set_pinned(&self, unit_id: &str, id: &str, pinned_at: Option<String>) -> Result<bool> {
        let store = &self.store;
        let action = if pinned_at.is_some() {
            "Pinned memo"
        } else {
            "Unpinned memo"
        };
        let done = self
            .mutate(unit_id, action, id, |buffer| {
                ensure_not_permanently_deleted(store, buffer, id)?;
                Ok(store
                    .set_pinned(buffer, id, pinned_at.as_deref())
                    .map(|next| (next, ())))
            })
            .await?;
        Ok(done.is_some())
    }

    /// Remove trashed memos older than the retention period; returns how
    /// many were removed.
    pub async fn purge_expired(&self, unit_id: &str) -> Result<usize> {
        let store = &self.store;
        let retention = self.retention_days;
        let removed = self
            .mutate(unit_id, "Purged", "expired memos", |buffer| {
                let (next, removed) = store.cleanup_expired(buffer, retention, Local::now().into());
                Ok((removed > 0).then_some((next, removed)))
            })
            .await?;
        Ok(removed.unwrap_or(0))
    }

    // =========================================================================
    // Cache control
    // =========================================================================

    /// Drop everything cached for `unit_id`.
    pub async fn invalidate(&self, unit_id: &str) {
        self.cache.lock().await.invalidate_unit(unit_id);
        self.threads.lock().await.invalidate_unit(unit_id);
    }

    pub async fn clear_all(&self) {
        self.cache.lock().await.clear_all();
        self.threads.lock().await.clear();
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Run one read-modify-write cycle under the unit lock.
    ///
    /// `compute` returns `None` for "not found / nothing to do", in which
    /// case nothing is written.
    async fn mutate<T, F>(
        &self,
        unit_id: &str,
        action: &str,
        target: &str,
        compute: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(&str) -> Result<Option<(String, T)>>,
    {
        let _guard = self.backend.lock(unit_id).await;
        let buffer = self.backend.read_buffer(unit_id).await?;

        let Some((next, value)) = compute(&buffer)? else {
            tracing::debug!("{} {}: no change in {}", action, target, unit_id);
            return Ok(None);
        };

        self.backend.write_buffer(unit_id, &next).await?;
        self.invalidate(unit_id).await;
        tracing::info!("{} {} in {}", action, target, unit_id);
        Ok(Some(value))
    }
}

impl std::fmt::Debug for MemoLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoLog")
            .field("backend", &self.backend.name())
            .field("order", &self.order)
            .field("retention_days", &self.retention_days)
            .finish()
    }
}

fn ensure_not_permanently_deleted(store: &MemoStore, buffer: &str, id: &str) -> Result<()> {
    match store.find(buffer, id) {
        Some(memo) if memo.permanently_deleted => Err(Error::invalid_state(format!(
            "memo {} is permanently deleted",
            id
        ))),
        _ => Ok(()),
    }
}

/// Builder for `MemoLog`
pub struct MemoLogBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    store: MemoStore,
    order: InsertOrder,
    retention_days: u32,
    cache_capacity: usize,
}

impl MemoLogBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            store: MemoStore::new(),
            order: InsertOrder::default(),
            retention_days: 30,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set the storage backend (required)
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn default_template(mut self, template: impl Into<String>) -> Self {
        self.store = self.store.with_default_template(template);
        self
    }

    pub fn todo_mode(mut self, todo_mode: bool) -> Self {
        self.store = self.store.with_todo_mode(todo_mode);
        self
    }

    pub fn insert_order(mut self, order: InsertOrder) -> Self {
        self.order = order;
        self
    }

    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<MemoLog> {
        let backend = self
            .backend
            .ok_or_else(|| Error::Config("a storage backend is required".to_string()))?;
        Ok(MemoLog {
            backend,
            store: self.store,
            order: self.order,
            retention_days: self.retention_days,
            cache: Mutex::new(MemoCache::new(self.cache_capacity)),
            threads: Mutex::new(ThreadIndexCache::new()),
        })
    }
}

impl Default for MemoLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
