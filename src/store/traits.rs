//! Store contract consumed by the cache.
//!
//! A store owns the mappings and everything about how they are kept
//! (eviction, tiering, expiration bookkeeping). The cache only talks to it
//! through [`Store`], and every call may fail with a [`StoreAccessError`].
//!
//! The two bulk primitives must be atomic per key: while a batch function
//! runs for a key, no other caller may observe or compute that key. The cache
//! relies on this to guarantee a key is never loaded twice concurrently.

use std::sync::Arc;

use crate::error::{BoxError, BulkComputeError, StoreAccessError};

/// Store-owned wrapper around a mapped value.
///
/// Carries bookkeeping the cache never looks at.
#[derive(Debug)]
pub struct ValueHolder<V> {
    value: Arc<V>,
    creation_time: u64,
    expiration_time: Option<u64>,
}

impl<V> ValueHolder<V> {
    pub fn new(value: Arc<V>, creation_time: u64, expiration_time: Option<u64>) -> Self {
        Self {
            value,
            creation_time,
            expiration_time,
        }
    }

    /// Holder that never expires.
    pub fn eternal(value: Arc<V>) -> Self {
        Self::new(value, 0, None)
    }

    #[inline]
    pub fn get(&self) -> &Arc<V> {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> Arc<V> {
        self.value
    }

    #[inline]
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    #[inline]
    pub fn expiration_time(&self) -> Option<u64> {
        self.expiration_time
    }

    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration_time.is_some_and(|at| at <= now)
    }
}

impl<V> Clone for ValueHolder<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            creation_time: self.creation_time,
            expiration_time: self.expiration_time,
        }
    }
}

/// Result of [`Store::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStatus {
    /// The value was installed.
    Put,
    /// Nothing changed, e.g. the value was expired on arrival.
    Noop,
}

/// Snapshot of store-level metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub removes: u64,
    pub expirations: u64,
}

/// One raw step of a store iteration.
pub type StoreEntry<K, V> = (K, ValueHolder<V>);

/// Lazy raw iteration over a store.
pub type StoreIter<'a, K, V> =
    Box<dyn Iterator<Item = Result<StoreEntry<K, V>, StoreAccessError>> + Send + 'a>;

/// Mappings returned by a batch function: one `(key, value)` per key handed
/// to it, `None` meaning "no mapping".
pub type BatchMappings<K, V> = Vec<(K, Option<Arc<V>>)>;

/// Batch function for [`Store::bulk_compute_if_absent`]: receives the absent
/// keys of the batch.
pub type BulkLoadFn<'a, K, V> = dyn FnMut(&[K]) -> Result<BatchMappings<K, V>, BoxError> + 'a;

/// Batch function for [`Store::bulk_compute`]: receives every key of the
/// batch with its current value.
pub type BulkRemapFn<'a, K, V> =
    dyn FnMut(BatchMappings<K, V>) -> Result<BatchMappings<K, V>, BoxError> + 'a;

/// Narrow store contract.
pub trait Store<K, V>: Send + Sync {
    /// Fetch the live holder for `key`.
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError>;

    /// Check whether `key` has a live mapping.
    fn contains_key(&self, key: &K) -> Result<bool, StoreAccessError>;

    /// Install or overwrite a mapping.
    fn put(&self, key: K, value: Arc<V>) -> Result<PutStatus, StoreAccessError>;

    /// Remove a mapping. Returns whether one was present.
    fn remove(&self, key: &K) -> Result<bool, StoreAccessError>;

    /// Remove every mapping.
    fn clear(&self) -> Result<(), StoreAccessError>;

    /// Raw iteration. May include mappings that have expired since the
    /// iteration started; each step may fail independently.
    fn iter(&self) -> StoreIter<'_, K, V>;

    /// For the keys of `keys` that have no mapping, call `loader` once with
    /// exactly those keys and install what it returns. Returns every
    /// requested key with its resulting holder, in request order.
    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        loader: &mut BulkLoadFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError>;

    /// Call `remapper` once with every key of `keys` and its current value,
    /// then install what it returns (`None` removes the mapping). Returns
    /// every requested key with its resulting holder, in request order.
    fn bulk_compute(
        &self,
        keys: &[K],
        remapper: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError>;

    /// Snapshot the store's metrics.
    fn metrics(&self) -> StoreMetrics {
        StoreMetrics::default()
    }
}

impl<K, V, S> Store<K, V> for Arc<S>
where
    S: Store<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError> {
        (**self).get(key)
    }

    fn contains_key(&self, key: &K) -> Result<bool, StoreAccessError> {
        (**self).contains_key(key)
    }

    fn put(&self, key: K, value: Arc<V>) -> Result<PutStatus, StoreAccessError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &K) -> Result<bool, StoreAccessError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        (**self).clear()
    }

    fn iter(&self) -> StoreIter<'_, K, V> {
        (**self).iter()
    }

    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        loader: &mut BulkLoadFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        (**self).bulk_compute_if_absent(keys, loader)
    }

    fn bulk_compute(
        &self,
        keys: &[K],
        remapper: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        (**self).bulk_compute(keys, remapper)
    }

    fn metrics(&self) -> StoreMetrics {
        (**self).metrics()
    }
}
