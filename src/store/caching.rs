//! Write-through LRU cache in front of any `KeyStore` backend.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::primitives::zeroize_bytes;
use crate::store::{EncryptedKey, KeyStore};

const DEFAULT_CAPACITY: usize = 100;

/// Cumulative hit/miss counters and the derived hit rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Wraps any [`KeyStore`] with a size-bounded, write-through LRU cache.
/// Every value the cache holds equals what the backend would return for
/// that name; reads only ever return stale data for the instant between a
/// concurrent writer's backend call and its cache installation, which the
/// backend's own lock already serializes per name.
pub struct CachingKeyStore {
    backend: Arc<dyn KeyStore>,
    cache: Mutex<LruCache<String, EncryptedKey>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingKeyStore {
    pub fn new(backend: Arc<dyn KeyStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(
            NonZeroUsize::new(DEFAULT_CAPACITY).expect("default capacity is non-zero"),
        );
        Self {
            backend,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drops `name` from the cache only; the backend is untouched.
    pub fn invalidate(&self, name: &str) {
        if let Some(mut evicted) = self.cache.lock().pop(name) {
            zeroize_bytes(&mut evicted.priv_key_data);
        }
    }

    /// Drops every cached entry, zeroizing each before it is freed.
    pub fn invalidate_all(&self) {
        let mut cache = self.cache.lock();
        for (_, entry) in cache.iter_mut() {
            zeroize_bytes(&mut entry.priv_key_data);
        }
        cache.clear();
    }

    fn install(&self, name: &str, key: EncryptedKey) {
        if let Some((_, mut evicted)) = self.cache.lock().push(name.to_string(), key) {
            zeroize_bytes(&mut evicted.priv_key_data);
        }
    }
}

impl KeyStore for CachingKeyStore {
    fn store(&self, name: &str, key: EncryptedKey) -> Result<(), StoreError> {
        self.backend.store(name, key.clone())?;
        self.install(name, key);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<EncryptedKey, StoreError> {
        if let Some(hit) = self.cache.lock().get(name).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let key = self.backend.load(name)?;
        self.install(name, key.clone());
        Ok(key)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.invalidate(name);
        self.backend.delete(name)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        self.backend.list()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.invalidate_all();
        self.backend.close()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Algorithm;
    use crate::store::memory::MemoryKeyStore;

    fn entry(name: &str) -> EncryptedKey {
        EncryptedKey::new(name, Algorithm::Ed25519, vec![1], vec![2, 2, 2])
    }

    #[test]
    fn load_after_store_is_a_cache_hit() {
        let backend = Arc::new(MemoryKeyStore::new());
        let caching = CachingKeyStore::new(backend, 10);
        caching.store("alice", entry("alice")).unwrap();
        caching.load("alice").unwrap();
        let stats = caching.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn load_miss_then_hit_updates_stats() {
        let backend = Arc::new(MemoryKeyStore::new());
        backend.store("alice", entry("alice")).unwrap();
        let caching = CachingKeyStore::new(backend, 10);

        caching.load("alice").unwrap();
        caching.load("alice").unwrap();
        let stats = caching.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn eviction_at_capacity_drops_the_least_recently_used() {
        let backend = Arc::new(MemoryKeyStore::new());
        let caching = CachingKeyStore::new(backend, 2);
        caching.store("a", entry("a")).unwrap();
        caching.store("b", entry("b")).unwrap();
        caching.store("c", entry("c")).unwrap();

        // "a" was pushed out when "c" came in; a subsequent load is a miss
        // that reloads it from the (still-present) backend.
        let misses_before = caching.stats().misses;
        caching.load("a").unwrap();
        assert_eq!(caching.stats().misses, misses_before + 1);
    }

    #[test]
    fn invalidate_drops_only_the_named_entry() {
        let backend = Arc::new(MemoryKeyStore::new());
        let caching = CachingKeyStore::new(backend, 10);
        caching.store("a", entry("a")).unwrap();
        caching.store("b", entry("b")).unwrap();

        caching.invalidate("a");
        let misses_before = caching.stats().misses;
        caching.load("a").unwrap();
        caching.load("b").unwrap();
        assert_eq!(caching.stats().misses, misses_before + 1);
    }

    #[test]
    fn capacity_zero_falls_back_to_default() {
        let backend = Arc::new(MemoryKeyStore::new());
        let caching = CachingKeyStore::new(backend, 0);
        for i in 0..DEFAULT_CAPACITY {
            caching.store(&format!("k{i}"), entry(&format!("k{i}"))).unwrap();
        }
        // All DEFAULT_CAPACITY entries should still be cache hits.
        for i in 0..DEFAULT_CAPACITY {
            caching.load(&format!("k{i}")).unwrap();
        }
        assert_eq!(caching.stats().misses, 0);
    }
}
