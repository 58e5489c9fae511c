// Bounded conversion cache
//
// One LRU map shared by every conversion call site: TeX→MathML results keyed
// by (mode, latex) and MathML→OMML results keyed by the raw MathML string.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of cached conversions
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// What a cached value was produced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMode {
    /// Inline TeX → MathML
    Inline,
    /// Display TeX → MathML
    Display,
    /// MathML → OMML
    Omml,
}

impl CacheMode {
    #[inline]
    pub fn for_display(display: bool) -> Self {
        if display { CacheMode::Display } else { CacheMode::Inline }
    }
}

/// Cache key: conversion mode plus the exact source string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mode: CacheMode,
    pub source: String,
}

impl CacheKey {
    pub fn new(mode: CacheMode, source: impl Into<String>) -> Self {
        Self {
            mode,
            source: source.into(),
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Least-recently-used cache of converted markup.
///
/// Reads touch the entry, so the entry evicted on overflow is the one least
/// recently inserted *or* read.
pub struct ConversionCache {
    cache: LruCache<CacheKey, String>,
    stats: CacheStats,
}

impl ConversionCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats {
                capacity,
                ..Default::default()
            },
        }
    }

    /// Look up and touch an entry.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        match self.cache.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value.clone())
            },
            None => {
                self.stats.misses += 1;
                None
            },
        }
    }

    /// Check for an entry without touching it.
    #[inline]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert or replace an entry, evicting the least recently used one on overflow.
    pub fn put(&mut self, key: CacheKey, value: String) {
        if let Some((evicted, _)) = self.cache.push(key, value) {
            // push returns the replaced entry on update too; only count real evictions
            if !self.cache.contains(&evicted) {
                self.stats.evictions += 1;
                tracing::debug!(mode = ?evicted.mode, "conversion cache evicted entry");
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.stats.capacity
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            ..self.stats
        }
    }
}

impl Default for ConversionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Handle to the one cache shared by the adapter and the OMML transformer.
///
/// The lock is only held for synchronous lookups and inserts, never across an
/// await point.
#[derive(Clone, Default)]
pub struct SharedCache {
    inner: Arc<Mutex<ConversionCache>>,
}

impl SharedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConversionCache::new(capacity))),
        }
    }

    #[inline]
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.inner.lock().get(key)
    }

    #[inline]
    pub fn put(&self, key: CacheKey, value: String) {
        self.inner.lock().put(key, value);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(CacheMode::Inline, s)
    }

    #[test]
    fn test_bounded_eviction_of_least_recent() {
        let mut cache = ConversionCache::new(3);
        cache.put(key("a"), "A".into());
        cache.put(key("b"), "B".into());
        cache.put(key("c"), "C".into());
        cache.put(key("d"), "D".into());

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key("a")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_read_touches_entry() {
        let mut cache = ConversionCache::new(2);
        cache.put(key("a"), "A".into());
        cache.put(key("b"), "B".into());
        assert_eq!(cache.get(&key("a")).as_deref(), Some("A"));
        cache.put(key("c"), "C".into());

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
    }

    #[test]
    fn test_mode_is_part_of_key() {
        let mut cache = ConversionCache::new(4);
        cache.put(CacheKey::new(CacheMode::Inline, "x"), "inline".into());
        cache.put(CacheKey::new(CacheMode::Display, "x"), "display".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get(&CacheKey::new(CacheMode::Display, "x")).as_deref(),
            Some("display")
        );
    }

    #[test]
    fn test_update_is_not_an_eviction() {
        let mut cache = ConversionCache::new(2);
        cache.put(key("a"), "A".into());
        cache.put(key("a"), "A2".into());
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get(&key("a")).as_deref(), Some("A2"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = ConversionCache::new(0);
        cache.put(key("a"), "A".into());
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_handle_sees_same_entries() {
        let shared = SharedCache::new(10);
        let other = shared.clone();
        shared.put(key("a"), "A".into());
        assert_eq!(other.get(&key("a")).as_deref(), Some("A"));
        assert_eq!(other.stats().hits, 1);
    }
}
