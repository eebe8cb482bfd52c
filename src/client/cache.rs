//! Caches for SRV lookups.

use arc_swap::ArcSwap;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

/// The items produced by one successful lookup, along with when they were
/// fetched and until when they may be served without a new lookup.
#[derive(Debug)]
pub struct Cache<T> {
    fetched_at: Instant,
    valid_until: Option<Instant>,
    items: Box<[T]>,
}

impl<T> Cache<T> {
    /// Creates a new cache of items. A `valid_until` of `None` never expires.
    pub fn new(items: impl Into<Box<[T]>>, fetched_at: Instant, valid_until: Option<Instant>) -> Self {
        Self {
            fetched_at,
            valid_until,
            items: items.into(),
        }
    }

    /// Determines if a cache may still be served without a new lookup.
    pub fn valid(&self) -> bool {
        self.valid_until.map_or(true, |deadline| Instant::now() <= deadline)
    }

    /// How long ago the cached items were fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Gets the items stored in a cache.
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

/// Per-service caches, swapped atomically so lookups never block each other.
#[derive(Debug)]
pub(crate) struct CacheMap<T> {
    entries: ArcSwap<HashMap<String, Arc<Cache<T>>>>,
}

impl<T> Default for CacheMap<T> {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl<T> CacheMap<T> {
    pub(crate) fn get(&self, srv: &str) -> Option<Arc<Cache<T>>> {
        self.entries.load().get(srv).cloned()
    }

    pub(crate) fn insert(&self, srv: &str, cache: Cache<T>) {
        let cache = Arc::new(cache);
        self.entries.rcu(|entries| {
            let mut entries = HashMap::clone(entries);
            entries.insert(srv.to_owned(), cache.clone());
            entries
        });
    }

    pub(crate) fn remove(&self, srv: &str) -> bool {
        if !self.entries.load().contains_key(srv) {
            return false;
        }
        let mut removed = false;
        self.entries.rcu(|entries| {
            let mut entries = HashMap::clone(entries);
            removed = entries.remove(srv).is_some();
            entries
        });
        removed
    }

    pub(crate) fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_without_deadline_stays_valid() {
        let cache = Cache::new(vec![1, 2, 3], Instant::now(), None);
        assert!(cache.valid());
        assert_eq!(cache.items(), &[1, 2, 3]);
    }

    #[test]
    fn cache_past_deadline_is_invalid() {
        let now = Instant::now();
        let cache = Cache::new(vec![1], now, Some(now - Duration::from_millis(1)));
        assert!(!cache.valid());
    }

    #[test]
    fn map_insert_replace_remove() {
        let map = CacheMap::default();
        map.insert("_a._tcp.test", Cache::new(vec![1], Instant::now(), None));
        map.insert("_a._tcp.test", Cache::new(vec![2], Instant::now(), None));
        map.insert("_b._tcp.test", Cache::new(vec![3], Instant::now(), None));
        assert_eq!(map.get("_a._tcp.test").unwrap().items(), &[2]);

        assert!(map.remove("_a._tcp.test"));
        assert!(!map.remove("_a._tcp.test"));
        assert!(map.get("_a._tcp.test").is_none());

        map.clear();
        assert!(map.get("_b._tcp.test").is_none());
    }
}
