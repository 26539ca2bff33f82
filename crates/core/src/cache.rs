//! Fixed-capacity store of upscaled images keyed by caller-supplied strings.

use std::collections::VecDeque;

use tracing::debug;

use crate::raster::RasterImage;

/// Default slot count, matching the reference behavior.
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// One cached upscale result. The cache owns the image; lookups lend it.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: String,
    pub image: RasterImage,
}

/// Chooses which entry to discard when the cache is full.
///
/// Entries are kept in insertion order, oldest first. Recency-based
/// policies can reorder on [`EvictionPolicy::on_lookup`].
pub trait EvictionPolicy: Send {
    /// Index of the entry to evict. `entries` is never empty.
    fn victim(&self, entries: &VecDeque<CacheEntry>) -> usize;

    /// Notification that the entry at `index` was looked up.
    fn on_lookup(&self, _entries: &mut VecDeque<CacheEntry>, _index: usize) {}
}

/// Strict FIFO: the oldest-inserted entry goes first. Lookups never touch
/// the order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoEviction;

impl EvictionPolicy for FifoEviction {
    fn victim(&self, _entries: &VecDeque<CacheEntry>) -> usize {
        0
    }
}

/// Key-addressed result cache with a fixed capacity.
///
/// At most one entry exists per key: inserting an existing key replaces
/// that entry in place rather than evicting an unrelated one.
pub struct ResultCache<P: EvictionPolicy = FifoEviction> {
    capacity: usize,
    entries: VecDeque<CacheEntry>,
    policy: P,
}

impl ResultCache<FifoEviction> {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, FifoEviction)
    }
}

impl<P: EvictionPolicy> ResultCache<P> {
    pub fn with_policy(capacity: usize, policy: P) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-match lookup. An absent key never matches.
    pub fn lookup(&mut self, key: Option<&str>) -> Option<&RasterImage> {
        let key = key?;
        let index = self.entries.iter().position(|e| e.key == key)?;
        self.policy.on_lookup(&mut self.entries, index);
        // Re-find after the policy callback, which may reorder entries.
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.image)
    }

    /// Install an entry, replacing any existing entry with the same key and
    /// otherwise evicting per policy when full. Capacity never grows.
    pub fn insert(&mut self, key: String, image: RasterImage) {
        if self.capacity == 0 {
            return;
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == key) {
            debug!(key = %key, "replacing cached upscale result");
            existing.image = image;
            return;
        }

        if self.entries.len() == self.capacity {
            let victim = self.policy.victim(&self.entries);
            if let Some(evicted) = self.entries.remove(victim) {
                debug!(key = %evicted.key, "evicting cached upscale result");
            }
        }

        self.entries.push_back(CacheEntry { key, image });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Colorspace;

    fn stamp(value: u8) -> RasterImage {
        RasterImage::from_parts(1, 1, 3, Colorspace::Srgb, vec![value, value, value])
            .unwrap()
    }

    #[test]
    fn lookup_absent_key_is_always_a_miss() {
        let mut cache = ResultCache::new(4);
        cache.insert("a".to_string(), stamp(1));
        assert!(cache.lookup(None).is_none());
    }

    #[test]
    fn lookup_requires_exact_match() {
        let mut cache = ResultCache::new(4);
        cache.insert("page-1".to_string(), stamp(1));

        assert!(cache.lookup(Some("page-1")).is_some());
        assert!(cache.lookup(Some("page")).is_none());
        assert!(cache.lookup(Some("page-12")).is_none());
    }

    #[test]
    fn fifo_evicts_oldest_inserted_entry() {
        let mut cache = ResultCache::new(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.insert(key.to_string(), stamp(i as u8));
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.lookup(Some("a")).is_none());
        assert!(cache.lookup(Some("b")).is_some());
        assert!(cache.lookup(Some("d")).is_some());
    }

    #[test]
    fn lookups_do_not_affect_eviction_order() {
        let mut cache = ResultCache::new(2);
        cache.insert("a".to_string(), stamp(1));
        cache.insert("b".to_string(), stamp(2));

        // Touch "a" repeatedly; FIFO must still evict it first.
        for _ in 0..5 {
            assert!(cache.lookup(Some("a")).is_some());
        }
        cache.insert("c".to_string(), stamp(3));

        assert!(cache.lookup(Some("a")).is_none());
        assert!(cache.lookup(Some("b")).is_some());
    }

    #[test]
    fn insert_existing_key_replaces_in_place() {
        let mut cache = ResultCache::new(2);
        cache.insert("a".to_string(), stamp(1));
        cache.insert("b".to_string(), stamp(2));

        // Re-inserting "a" while full must not evict "b".
        cache.insert("a".to_string(), stamp(9));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(Some("a")).unwrap().data()[0], 9);
        assert!(cache.lookup(Some("b")).is_some());
    }

    #[test]
    fn capacity_plus_one_inserts_leave_capacity_entries() {
        let capacity = 4;
        let mut cache = ResultCache::new(capacity);
        for i in 0..=capacity {
            cache.insert(format!("key-{i}"), stamp(i as u8));
        }

        assert_eq!(cache.len(), capacity);
        assert!(cache.lookup(Some("key-0")).is_none());
        for i in 1..=capacity {
            let key = format!("key-{i}");
            assert!(cache.lookup(Some(key.as_str())).is_some());
        }
    }

    #[test]
    fn zero_capacity_cache_stores_nothing() {
        let mut cache = ResultCache::new(0);
        cache.insert("a".to_string(), stamp(1));
        assert!(cache.is_empty());
        assert!(cache.lookup(Some("a")).is_none());
    }
}
