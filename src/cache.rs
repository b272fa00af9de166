/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::{self, Debug, Formatter};
use std::hash::{BuildHasherDefault, Hash};
use std::num::NonZeroUsize;

use rustc_hash::FxHasher;

use crate::error::CacheError;

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Receives entries leaving the cache
///
/// Called synchronously for entries evicted by capacity pressure and for
/// entries removed explicitly. It runs while the cache is borrowed mutably
/// (and usually while its owner's lock is held), so it must never call back
/// into the cache or its owner.
pub trait EvictionListener<K, V>: Send + Sync {
    fn on_evict(&self, key: &K, value: &V);
}

impl<K, V, F> EvictionListener<K, V> for F
where
    F: Fn(&K, &V) + Send + Sync,
{
    fn on_evict(&self, key: &K, value: &V) {
        self(key, value)
    }
}

/// Fixed capacity key value store with least recently used eviction
pub struct LruCache<K, V> {
    entries: lru::LruCache<K, V, FxBuildHasher>,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::ZeroCapacity)?;

        Ok(Self {
            entries: lru::LruCache::with_hasher(capacity, FxBuildHasher::default()),
            listener: None,
        })
    }

    /// Creates a cache that notifies `listener` about every entry leaving it
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use scanprogress::LruCache;
    ///
    /// let evicted = Arc::new(AtomicUsize::new(0));
    /// let counter = evicted.clone();
    /// let mut cache: LruCache<&str, u32> = LruCache::with_listener(1, move |_: &&str, _: &u32| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// })
    /// .unwrap();
    ///
    /// cache.add("one", 1);
    /// cache.add("two", 2);
    ///
    /// assert_eq!(evicted.load(Ordering::Relaxed), 1);
    /// assert!(!cache.contains(&"one"));
    /// ```
    pub fn with_listener(
        capacity: usize,
        listener: impl EvictionListener<K, V> + 'static,
    ) -> Result<Self, CacheError> {
        let mut cache = Self::new(capacity)?;
        cache.listener = Some(Box::new(listener));
        Ok(cache)
    }

    /// Inserts or replaces a value, making it the most recently used one
    ///
    /// Returns `true` when another entry had to be evicted to make room.
    /// Replaced values are dropped without notifying the listener.
    pub fn add(&mut self, key: K, value: V) -> bool {
        if let Some(current) = self.entries.get_mut(&key) {
            *current = value;
            return false;
        }

        match self.entries.push(key, value) {
            Some((evicted_key, evicted)) => {
                self.notify(&evicted_key, &evicted);
                true
            }
            None => false,
        }
    }

    /// Looks up a value and marks it as recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Looks up a value for modification and marks it as recently used
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Looks up a value without affecting its recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Removes an entry, notifying the listener about it
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.pop(key)?;
        self.notify(key, &value);

        Some(value)
    }

    /// Keys ordered from the least to the most recently used
    pub fn keys(&self) -> Vec<K> {
        self.entries
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    fn notify(&self, key: &K, value: &V) {
        if let Some(listener) = &self.listener {
            listener.on_evict(key, value);
        }
    }
}

impl<K, V> Debug for LruCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.entries.cap())
            .field("len", &self.entries.len())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    type Evicted = Arc<Mutex<Vec<(&'static str, u32)>>>;

    fn recording_cache(capacity: usize) -> (LruCache<&'static str, u32>, Evicted) {
        let evicted = Evicted::default();
        let target = evicted.clone();
        let cache = LruCache::with_listener(capacity, move |key: &&'static str, value: &u32| {
            target.lock().unwrap().push((*key, *value));
        })
        .unwrap();

        (cache, evicted)
    }

    #[test]
    fn rejects_zero_capacity() {
        assert_eq!(
            LruCache::<&str, u32>::new(0).unwrap_err(),
            CacheError::ZeroCapacity
        );
    }

    #[test]
    fn evicts_least_recently_added_entry() {
        let (mut cache, evicted) = recording_cache(2);

        assert!(!cache.add("one", 1));
        assert!(!cache.add("two", 2));
        assert!(cache.add("three", 3));

        assert_eq!(cache.len(), 2);
        assert_eq!(*evicted.lock().unwrap(), vec![("one", 1)]);
        assert_eq!(cache.keys(), vec!["two", "three"]);
    }

    #[test]
    fn lookup_refreshes_recency() {
        let (mut cache, evicted) = recording_cache(2);

        cache.add("one", 1);
        cache.add("two", 2);
        assert_eq!(cache.get(&"one"), Some(&1));
        cache.add("three", 3);

        assert_eq!(*evicted.lock().unwrap(), vec![("two", 2)]);
    }

    #[test]
    fn peek_keeps_recency() {
        let (mut cache, evicted) = recording_cache(2);

        cache.add("one", 1);
        cache.add("two", 2);
        assert_eq!(cache.peek(&"one"), Some(&1));
        cache.add("three", 3);

        assert_eq!(*evicted.lock().unwrap(), vec![("one", 1)]);
    }

    #[test]
    fn replacing_value_refreshes_without_notification() {
        let (mut cache, evicted) = recording_cache(2);

        cache.add("one", 1);
        cache.add("two", 2);
        assert!(!cache.add("one", 10));

        assert!(evicted.lock().unwrap().is_empty());
        assert_eq!(cache.keys(), vec!["two", "one"]);
        assert_eq!(cache.peek(&"one"), Some(&10));
    }

    #[test]
    fn keys_follow_recency_after_modification() {
        let (mut cache, evicted) = recording_cache(3);

        cache.add("one", 1);
        cache.add("two", 2);
        cache.add("three", 3);
        if let Some(value) = cache.get_mut(&"one") {
            *value += 1;
        }
        cache.add("four", 4);

        assert_eq!(cache.keys(), vec!["three", "one", "four"]);
        assert_eq!(*evicted.lock().unwrap(), vec![("two", 2)]);
    }

    #[test]
    fn modifies_value_in_place() {
        let (mut cache, _) = recording_cache(2);

        cache.add("one", 1);
        if let Some(value) = cache.get_mut(&"one") {
            *value += 5;
        }

        assert_eq!(cache.peek(&"one"), Some(&6));
    }

    #[test]
    fn removal_notifies_listener() {
        let (mut cache, evicted) = recording_cache(2);

        cache.add("one", 1);

        assert_eq!(cache.remove(&"one"), Some(1));
        assert_eq!(cache.remove(&"one"), None);
        assert!(cache.is_empty());
        assert_eq!(*evicted.lock().unwrap(), vec![("one", 1)]);
    }

    #[test]
    fn missing_keys_are_not_found() {
        let mut cache = LruCache::<&str, u32>::new(1).unwrap();

        assert!(cache.get_mut(&"one").is_none());
        assert!(!cache.contains(&"one"));
        assert_eq!(cache.capacity(), 1);
    }
}
