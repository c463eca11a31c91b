use std::{borrow::Borrow, hash::Hash, num::NonZeroUsize};

use lru::LruCache;
use tracing::trace;

/// Number of distinct markup strings kept by default.
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// A bounded least-recently-used cache, owned by whichever component
/// composes it. Once full, inserting a new key evicts the entry that was
/// read or written longest ago.
#[derive(Debug)]
pub struct LayoutCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V> LayoutCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up an entry, marking it as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    /// Look up an entry without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.peek(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    pub fn put(&mut self, key: K, value: V) {
        let evicting = !self.entries.contains(&key) && self.entries.len() == self.entries.cap().get();

        self.entries.put(key, value);

        if evicting {
            trace!(capacity = self.entries.cap().get(), "Evicted least recently used entry");
        }
    }

    pub fn evict_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.cap()
    }
}

impl<K: Hash + Eq, V> Default for LayoutCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LayoutCache::new(NonZeroUsize::new(3).unwrap());

        cache.put("key1".to_string(), 1);
        cache.put("key2".to_string(), 2);
        cache.put("key3".to_string(), 3);

        // Touch key1 so key2 becomes the oldest.
        assert_eq!(cache.get("key1"), Some(&1));

        cache.put("key4".to_string(), 4);

        assert!(cache.contains("key1"), "key1 should still be present");
        assert!(!cache.contains("key2"), "key2 should have been evicted");
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn default_capacity_is_twenty() {
        let mut cache = LayoutCache::default();

        for i in 0..25 {
            cache.put(i, i);
        }

        assert_eq!(cache.len(), 20);
        assert!(!cache.contains(&4));
        assert!(cache.contains(&5));
    }

    #[test]
    fn evict_all_empties_the_cache() {
        let mut cache = LayoutCache::default();
        cache.put("a", 1);
        cache.evict_all();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
