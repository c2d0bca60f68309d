//! Bounded key/value cache with LRU eviction
//!
//! Capacity-limited map that evicts the least-recently-used entry when full.
//! Each entry can carry an opaque caller-defined tag that the cache stores
//! but never interprets.
//!
//! The cache is synchronous and not internally locked; owners that share it
//! wrap it in a mutex.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default capacity for bounded caches.
pub const DEFAULT_CAPACITY: usize = 64;

struct Entry<V, T> {
    value: V,
    tag: Option<T>,
}

/// A capacity-limited cache with LRU eviction.
///
/// When the cache reaches capacity, the least-recently-used entry is evicted
/// before the new one is inserted. Access via `get()` promotes the entry to
/// most-recently-used.
pub struct BoundedCache<K, V, T = ()> {
    map: HashMap<K, Entry<V, T>>,
    /// LRU order: front = oldest, back = newest
    order: VecDeque<K>,
    capacity: usize,
}

impl<K, V, T> BoundedCache<K, V, T>
where
    K: Eq + Hash + Clone,
{
    /// Create a new cache with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Create a new cache with the default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Store a value, evicting the LRU entry if at capacity.
    /// Returns the evicted key if eviction occurred.
    pub fn set(&mut self, key: K, value: V, tag: Option<T>) -> Option<K> {
        // If key already exists, remove from order list (will re-add at back)
        let existed = self.map.contains_key(&key);
        if existed {
            self.order.retain(|k| *k != key);
        }

        let evicted = if !existed && self.map.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        self.map.insert(key.clone(), Entry { value, tag });
        self.order.push_back(key);

        evicted
    }

    /// Retrieve a value, promoting it to most-recently-used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.map.contains_key(key) {
            return None;
        }
        self.order.retain(|k| k != key);
        self.order.push_back(key.clone());
        self.map.get(key).map(|e| &e.value)
    }

    /// Retrieve a value without promoting it.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|e| &e.value)
    }

    /// Tag stored with `key`, if the entry exists and has one.
    pub fn tag(&self, key: &K) -> Option<&T> {
        self.map.get(key).and_then(|e| e.tag.as_ref())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Remove an entry, returning its value.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        let entry = self.map.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry.value)
    }

    /// Remove every entry whose key matches `pred`; returns how many went.
    pub fn invalidate_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let before = self.map.len();
        self.map.retain(|k, _| !pred(k));
        let map = &self.map;
        self.order.retain(|k| map.contains_key(k));
        before - self.map.len()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Get the current number of entries.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evict the least-recently-used entry.
    fn evict_lru(&mut self) -> Option<K> {
        let lru = self.order.pop_front()?;
        self.map.remove(&lru);
        Some(lru)
    }
}

impl<K, V, T> std::fmt::Debug for BoundedCache<K, V, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("size", &self.map.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut cache: BoundedCache<&str, String> = BoundedCache::new(10);
        let evicted = cache.set("a", "hello".to_string(), None);
        assert!(evicted.is_none());
        assert_eq!(cache.get(&"a").map(String::as_str), Some("hello"));
        assert!(cache.get(&"b").is_none());
    }

    #[test]
    fn test_capacity_eviction() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(3);
        cache.set(1, "first", None);
        cache.set(2, "second", None);
        cache.set(3, "third", None);
        assert_eq!(cache.size(), 3);

        // Adding a 4th should evict the LRU (first)
        let evicted = cache.set(4, "fourth", None);
        assert_eq!(evicted, Some(1));
        assert_eq!(cache.size(), 3);
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn test_get_promotes_to_mru() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(3);
        cache.set(1, "first", None);
        cache.set(2, "second", None);
        cache.set(3, "third", None);

        cache.get(&1);

        // Now 2 is LRU, should be evicted
        assert_eq!(cache.set(4, "fourth", None), Some(2));
        assert!(cache.get(&1).is_some());
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(3);
        cache.set(1, "first", None);
        cache.set(2, "second", None);
        cache.set(3, "third", None);

        cache.peek(&1);

        assert_eq!(cache.set(4, "fourth", None), Some(1));
    }

    #[test]
    fn test_set_same_key_updates_without_duplicate_recency() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(2);
        cache.set(1, "original", None);
        cache.set(2, "other", None);
        cache.set(1, "updated", None);

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.peek(&1), Some(&"updated"));

        // 1 was refreshed, so 2 is the LRU
        assert_eq!(cache.set(3, "third", None), Some(2));
        // A stale recency entry for 1 would have been popped here instead
        assert_eq!(cache.set(4, "fourth", None), Some(1));
    }

    #[test]
    fn test_tags() {
        let mut cache: BoundedCache<&str, u8, u64> = BoundedCache::new(4);
        cache.set("tagged", 1, Some(42));
        cache.set("untagged", 2, None);
        assert_eq!(cache.tag(&"tagged"), Some(&42));
        assert_eq!(cache.tag(&"untagged"), None);
        assert_eq!(cache.tag(&"missing"), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(10);
        cache.set(1, "a", None);
        cache.set(2, "b", None);
        cache.set(3, "c", None);

        assert_eq!(cache.invalidate(&2), Some("b"));
        assert_eq!(cache.invalidate(&2), None);
        assert_eq!(cache.size(), 2);

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_where() {
        let mut cache: BoundedCache<String, u8> = BoundedCache::new(10);
        cache.set("a::x".to_string(), 1, None);
        cache.set("a::y".to_string(), 2, None);
        cache.set("b::x".to_string(), 3, None);

        assert_eq!(cache.invalidate_where(|k| k.starts_with("a::")), 2);
        assert_eq!(cache.size(), 1);

        // order list stayed in sync: filling up evicts only live keys
        let mut small: BoundedCache<u32, u8> = BoundedCache::new(2);
        small.set(1, 1, None);
        small.set(2, 2, None);
        small.invalidate_where(|k| *k == 1);
        small.set(3, 3, None);
        assert_eq!(small.set(4, 4, None), Some(2));
    }

    #[test]
    fn test_default_capacity() {
        let cache: BoundedCache<u32, u32> = BoundedCache::with_default_capacity();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_capacity_one() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(1);
        cache.set(1, "first", None);
        assert_eq!(cache.set(2, "second", None), Some(1));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache: BoundedCache<u32, &str> = BoundedCache::new(0);
        cache.set(1, "only", None);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_eviction_order_fifo_without_access() {
        let mut cache: BoundedCache<u32, u32> = BoundedCache::new(3);
        for i in 0..5 {
            cache.set(i, i, None);
        }

        // Only last 3 should remain
        assert_eq!(cache.size(), 3);
        assert!(cache.peek(&0).is_none());
        assert!(cache.peek(&1).is_none());
        assert!(cache.peek(&2).is_some());
        assert!(cache.peek(&3).is_some());
        assert!(cache.peek(&4).is_some());
    }
}
