//! Memo cache policy
//!
//! Parsed memo lists are cached per `(unit, category)` and tagged with the
//! storage unit's modification time at read. A lookup only hits when the
//! unit still exists and its current modification time matches the tag.

use super::bounded::BoundedCache;
use crate::memo::MemoRecord;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Cache key: one storage unit filtered by one category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    unit_id: String,
    category: String,
}

impl CacheKey {
    pub fn new(unit_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            category: category.into(),
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.unit_id, self.category)
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Bounded memo-list cache validated against storage modification times.
#[derive(Debug)]
pub struct MemoCache {
    entries: BoundedCache<CacheKey, Arc<Vec<MemoRecord>>, SystemTime>,
    stats: CacheStats,
}

impl MemoCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Look up a cached list.
    ///
    /// `current_mtime` is the unit's modification time right now, `None`
    /// when the unit no longer exists. A missing unit or a stale tag drops
    /// the entry; either way the lookup is a miss.
    pub fn get_memos(
        &mut self,
        key: &CacheKey,
        current_mtime: Option<SystemTime>,
    ) -> Option<Arc<Vec<MemoRecord>>> {
        let Some(current) = current_mtime else {
            if self.entries.invalidate(key).is_some() {
                tracing::debug!("Dropped cache entry {} for missing unit", key);
            }
            self.stats.misses += 1;
            return None;
        };

        if self.entries.tag(key) != Some(&current) {
            if self.entries.invalidate(key).is_some() {
                tracing::debug!("Dropped stale cache entry {}", key);
            }
            self.stats.misses += 1;
            return None;
        }

        let hit = self.entries.get(key).cloned();
        if hit.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        hit
    }

    /// Store a freshly parsed list tagged with the unit's modification time.
    pub fn set_memos(
        &mut self,
        key: CacheKey,
        records: Vec<MemoRecord>,
        mtime: Option<SystemTime>,
    ) -> Arc<Vec<MemoRecord>> {
        let records = Arc::new(records);
        if let Some(evicted) = self.entries.set(key, Arc::clone(&records), mtime) {
            tracing::debug!("Evicted cache entry {}", evicted);
        }
        records
    }

    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.invalidate(key);
    }

    /// Drop every category cached for `unit_id`.
    pub fn invalidate_unit(&mut self, unit_id: &str) -> usize {
        self.entries.invalidate_where(|k| k.unit_id() == unit_id)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.size()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
