//! HashMap-backed in-memory store.
//!
//! ## Architecture
//! - Mappings live in a `FxHashMap<K, ValueHolder<V>>` behind a single
//!   `parking_lot::RwLock`.
//! - Expiration is lazy: expired holders stay in the map until a read or a
//!   write touches them, so raw iteration can surface mappings that are
//!   already dead. The cache re-validates every iterated key.
//! - Bulk primitives hold the write lock across the batch function, which
//!   makes them atomic per key.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//!
//! use guardcache::store::hashmap::HashMapStore;
//! use guardcache::store::traits::{PutStatus, Store};
//!
//! let store: HashMapStore<u64, String> = HashMapStore::new();
//! assert_eq!(store.put(1, Arc::new("a".to_string())).unwrap(), PutStatus::Put);
//! assert!(store.contains_key(&1).unwrap());
//! ```
//!
//! ## Thread Safety
//! - `HashMapStore` is `Send + Sync` whenever `K` and `V` are.
//! - Batch functions run under the write lock; they must not call back into
//!   the same store.
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::error;

use crate::error::{BulkComputeError, StoreAccessError};
use crate::expiry::{Eternal, ExpiryPolicy, SystemTimeSource, TimeSource, expiration_time};
use crate::store::traits::{
    BulkLoadFn, BulkRemapFn, PutStatus, Store, StoreIter, StoreMetrics, ValueHolder,
};

/// Store metrics counters.
#[derive(Debug, Default)]
struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    expirations: AtomicU64,
}

impl StoreCounters {
    fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe HashMap-backed store with lazy expiration.
pub struct HashMapStore<K, V> {
    map: RwLock<FxHashMap<K, ValueHolder<V>>>,
    expiry: Arc<dyn ExpiryPolicy<K, V>>,
    time_source: Arc<dyn TimeSource>,
    metrics: StoreCounters,
}

impl<K, V> HashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a store whose mappings never expire.
    pub fn new() -> Self {
        Self::with_expiry(Arc::new(Eternal), Arc::new(SystemTimeSource))
    }
}

impl<K, V> HashMapStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a store that stamps mappings with `expiry` against `time_source`.
    pub fn with_expiry(
        expiry: Arc<dyn ExpiryPolicy<K, V>>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
            expiry,
            time_source,
            metrics: StoreCounters::default(),
        }
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        let now = self.time_source.now_millis();
        self.map
            .read()
            .values()
            .filter(|holder| !holder.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries physically held, expired ones included.
    pub fn raw_len(&self) -> usize {
        self.map.read().len()
    }

    /// Build the holder for `value`, or `None` when it is expired on arrival.
    fn holder_for(
        &self,
        key: &K,
        existing: Option<&ValueHolder<V>>,
        value: Arc<V>,
        now: u64,
    ) -> Option<ValueHolder<V>> {
        let ttl = match existing {
            None => self.expiry.expiry_for_creation(key, &value).map(Some),
            Some(old) => {
                let old_value = Arc::clone(old.get());
                self.expiry
                    .expiry_for_update(key, &move || Arc::clone(&old_value), &value)
            },
        };
        let expiration = match ttl {
            Ok(Some(ttl)) if ttl == Duration::ZERO => return None,
            Ok(Some(ttl)) => expiration_time(now, ttl),
            Ok(None) => existing.and_then(ValueHolder::expiration_time),
            Err(err) => {
                error!(error = %err, "expiry computation failed, expiry duration will be 0");
                return None;
            },
        };
        Some(ValueHolder::new(value, now, expiration))
    }

    /// Remove `key` if its holder is expired. Returns the live holder, if any.
    fn live_entry<'m>(
        &self,
        map: &'m mut FxHashMap<K, ValueHolder<V>>,
        key: &K,
        now: u64,
    ) -> Option<&'m ValueHolder<V>> {
        if map.get(key).is_some_and(|holder| holder.is_expired(now)) {
            map.remove(key);
            self.metrics.inc_expiration();
        }
        map.get(key)
    }
}

impl<K, V> Default for HashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for HashMapStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapStore")
            .field("entries", &self.map.read().len())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl<K, V> Store<K, V> for HashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError> {
        let now = self.time_source.now_millis();
        {
            let map = self.map.read();
            match map.get(key) {
                None => {
                    self.metrics.inc_miss();
                    return Ok(None);
                },
                Some(holder) if !holder.is_expired(now) => {
                    self.metrics.inc_hit();
                    return Ok(Some(holder.clone()));
                },
                Some(_) => {},
            }
        }

        let mut map = self.map.write();
        let live = self.live_entry(&mut map, key, now).cloned();
        if live.is_some() {
            self.metrics.inc_hit();
        } else {
            self.metrics.inc_miss();
        }
        Ok(live)
    }

    fn contains_key(&self, key: &K) -> Result<bool, StoreAccessError> {
        let now = self.time_source.now_millis();
        Ok(self
            .map
            .read()
            .get(key)
            .is_some_and(|holder| !holder.is_expired(now)))
    }

    fn put(&self, key: K, value: Arc<V>) -> Result<PutStatus, StoreAccessError> {
        let now = self.time_source.now_millis();
        let mut map = self.map.write();
        let existing = self.live_entry(&mut map, &key, now).cloned();
        match self.holder_for(&key, existing.as_ref(), value, now) {
            Some(holder) => {
                map.insert(key, holder);
                self.metrics.inc_put();
                Ok(PutStatus::Put)
            },
            None => {
                map.remove(&key);
                Ok(PutStatus::Noop)
            },
        }
    }

    fn remove(&self, key: &K) -> Result<bool, StoreAccessError> {
        let now = self.time_source.now_millis();
        let removed = self.map.write().remove(key);
        let was_live = removed.is_some_and(|holder| !holder.is_expired(now));
        if was_live {
            self.metrics.inc_remove();
        }
        Ok(was_live)
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        self.map.write().clear();
        Ok(())
    }

    fn iter(&self) -> StoreIter<'_, K, V> {
        let snapshot: Vec<_> = self
            .map
            .read()
            .iter()
            .map(|(key, holder)| (key.clone(), holder.clone()))
            .collect();
        Box::new(snapshot.into_iter().map(Ok))
    }

    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        loader: &mut BulkLoadFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        let now = self.time_source.now_millis();
        let mut map = self.map.write();

        let mut absent = Vec::new();
        for key in keys {
            if self.live_entry(&mut map, key, now).is_none() && !absent.contains(key) {
                absent.push(key.clone());
            }
        }

        if !absent.is_empty() {
            let mut loaded: FxHashMap<K, Option<Arc<V>>> =
                loader(&absent).map_err(BulkComputeError::Function)?.into_iter().collect();
            for key in absent {
                if let Some(Some(value)) = loaded.remove(&key) {
                    if let Some(holder) = self.holder_for(&key, None, value, now) {
                        map.insert(key, holder);
                        self.metrics.inc_put();
                    }
                }
            }
        }

        Ok(keys
            .iter()
            .map(|key| (key.clone(), map.get(key).cloned()))
            .collect())
    }

    fn bulk_compute(
        &self,
        keys: &[K],
        remapper: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        let now = self.time_source.now_millis();
        let mut map = self.map.write();

        let mut batch = Vec::with_capacity(keys.len());
        for key in keys {
            if batch.iter().any(|(seen, _)| seen == key) {
                continue;
            }
            let current = self
                .live_entry(&mut map, key, now)
                .map(|holder| Arc::clone(holder.get()));
            batch.push((key.clone(), current));
        }

        let mut remapped: FxHashMap<K, Option<Arc<V>>> =
            remapper(batch).map_err(BulkComputeError::Function)?.into_iter().collect();
        for key in keys {
            let Some(new_value) = remapped.remove(key) else {
                continue;
            };
            let existing = map.get(key).cloned();
            match (existing, new_value) {
                (Some(_), None) => {
                    map.remove(key);
                    self.metrics.inc_remove();
                },
                (None, None) => {},
                (Some(old), Some(value)) if Arc::ptr_eq(old.get(), &value) => {},
                (existing, Some(value)) => {
                    match self.holder_for(key, existing.as_ref(), value, now) {
                        Some(holder) => {
                            map.insert(key.clone(), holder);
                            self.metrics.inc_put();
                        },
                        None => {
                            map.remove(key);
                        },
                    }
                },
            }
        }

        Ok(keys
            .iter()
            .map(|key| (key.clone(), map.get(key).cloned()))
            .collect())
    }

    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}
