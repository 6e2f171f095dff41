//! Bounded in-memory lookup cache with TTL
//!
//! Caches external search responses between validation passes. Entries
//! expire after a fixed TTL and the cache holds at most `capacity` keys,
//! evicting the oldest-inserted key first (insertion order, not LRU); a hit
//! never refreshes an entry's position.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    insertion_order: VecDeque<String>,
}

/// TTL cache keyed by lowercase-trimmed query strings
pub struct LookupCache<T: Clone> {
    inner: RwLock<CacheInner<T>>,
    ttl: Duration,
    capacity: usize,
}

impl<T: Clone> LookupCache<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase()
    }

    /// Get a cached value; expired entries count as misses
    pub fn get(&self, key: &str) -> Option<T> {
        let key = Self::normalize_key(key);
        let inner = self.inner.read();
        inner.entries.get(&key).and_then(|entry| {
            if entry.fetched_at.elapsed() < self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Insert or refresh a value. Refreshing an existing key keeps its
    /// original insertion position.
    pub fn insert(&self, key: &str, value: T) {
        let key = Self::normalize_key(key);
        let mut inner = self.inner.write();

        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
        };
        if inner.entries.insert(key.clone(), entry).is_none() {
            inner.insertion_order.push_back(key);
        }

        while inner.entries.len() > self.capacity {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check presence without cloning the value
    pub fn contains(&self, key: &str) -> bool {
        let key = Self::normalize_key(key);
        let inner = self.inner.read();
        inner
            .entries
            .get(&key)
            .map(|e| e.fetched_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.insertion_order.clear();
    }
}

/// Shared cache handle injected into the validator
pub type SharedLookupCache<T> = Arc<LookupCache<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let cache = LookupCache::new(Duration::from_secs(60), 100);
        cache.insert("Naruto", vec![1u32, 2]);
        assert_eq!(cache.get("naruto"), Some(vec![1, 2]));
        assert_eq!(cache.get("  NARUTO  "), Some(vec![1, 2]));
        assert_eq!(cache.get("bleach"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = LookupCache::new(Duration::from_millis(30), 100);
        cache.insert("key", 1u32);
        assert_eq!(cache.get("key"), Some(1));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("key"), None);
        assert!(!cache.contains("key"));
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest_key() {
        let cache = LookupCache::new(Duration::from_secs(60), 100);
        for i in 0..100 {
            cache.insert(&format!("key-{i}"), i);
        }
        assert_eq!(cache.len(), 100);

        cache.insert("key-100", 100);
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get("key-0"), None);
        assert_eq!(cache.get("key-1"), Some(1));
        assert_eq!(cache.get("key-100"), Some(100));
    }

    #[test]
    fn test_refresh_keeps_insertion_position() {
        let cache = LookupCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);

        // "a" was inserted first, so it is still the eviction victim.
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_clear() {
        let cache = LookupCache::new(Duration::from_secs(60), 10);
        cache.insert("a", 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
