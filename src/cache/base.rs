//! Shared machinery of every cache variant.
//!
//! [`CacheBase`] owns what all variants have in common: the lifecycle state,
//! the store, the resilience strategy, the expiry policy and the statistics
//! sinks. [`CoreCache`] is the seam between the shared operations and a
//! variant: a variant supplies `remove_internal` and `get_all_internal`, the
//! trait supplies `get`, `contains_key`, `remove`, `clear`, `get_all`,
//! iteration and lifecycle management on top of them.
//!
//! ## Operation Shape
//!
//! ```text
//!   check_available()?          fails fast with CacheError::Unavailable
//!   store.op(..)                may fail with StoreAccessError
//!     Ok(raw)  -> interpret, record success outcome
//!     Err(e)   -> resilience.op_failure(.., e), record FAILURE
//! ```
//!
//! Exactly one outcome is recorded per call that got past the availability
//! check.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::iter::CacheEntryIter;
use crate::cache::{CacheKey, CacheValue};
use crate::error::{BoxError, BulkComputeError, CacheError};
use crate::expiry::{self, ExpiryPolicy};
use crate::metrics::counters::{BulkMethodEntries, BulkOps};
use crate::metrics::outcome::{CacheOutcome, ClearOutcome, GetOutcome};
use crate::metrics::snapshot::BulkEntriesSnapshot;
use crate::metrics::traits::OutcomeRecorder;
use crate::resilience::ResilienceStrategy;
use crate::status::{LifecycleHook, Status, StatusTransitioner};
use crate::store::traits::{BatchMappings, Store, ValueHolder};

/// State shared by every cache variant.
pub struct CacheBase<K, V> {
    name: String,
    status: StatusTransitioner,
    store: Arc<dyn Store<K, V>>,
    resilience: Box<dyn ResilienceStrategy<K, V>>,
    expiry: Arc<dyn ExpiryPolicy<K, V>>,
    recorder: Arc<dyn OutcomeRecorder>,
    bulk_entries: BulkMethodEntries,
}

impl<K, V> CacheBase<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn Store<K, V>>,
        resilience: Box<dyn ResilienceStrategy<K, V>>,
        expiry: Arc<dyn ExpiryPolicy<K, V>>,
        recorder: Arc<dyn OutcomeRecorder>,
    ) -> Self {
        Self {
            name: name.into(),
            status: StatusTransitioner::new(),
            store,
            resilience,
            expiry,
            recorder,
            bulk_entries: BulkMethodEntries::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status.current_status()
    }

    #[inline]
    pub fn check_available(&self) -> Result<(), CacheError> {
        self.status.check_available()
    }

    pub fn transitioner(&self) -> &StatusTransitioner {
        &self.status
    }

    pub fn store(&self) -> &dyn Store<K, V> {
        self.store.as_ref()
    }

    pub fn resilience(&self) -> &dyn ResilienceStrategy<K, V> {
        self.resilience.as_ref()
    }

    pub fn expiry(&self) -> &dyn ExpiryPolicy<K, V> {
        self.expiry.as_ref()
    }

    #[inline]
    pub fn record(&self, outcome: impl Into<CacheOutcome>) {
        self.recorder.record(outcome.into());
    }

    #[inline]
    pub fn add_bulk_method_entries_count(&self, op: BulkOps, count: u64) {
        self.bulk_entries.add(op, count);
    }

    pub fn bulk_method_entries(&self) -> BulkEntriesSnapshot {
        self.bulk_entries.snapshot()
    }

    /// See [`expiry::new_value_already_expired`].
    pub fn new_value_already_expired(
        &self,
        key: &K,
        old_value: Option<&Arc<V>>,
        new_value: &V,
    ) -> bool {
        expiry::new_value_already_expired(self.expiry.as_ref(), key, old_value, new_value)
    }

    /// Single-key lookup. `observe` controls whether a GET outcome is
    /// recorded; the iterator resolves liveness without one.
    pub(crate) fn lookup(&self, key: &K, observe: bool) -> Result<Option<Arc<V>>, CacheError> {
        self.check_available()?;
        match self.store.get(key) {
            Ok(Some(holder)) => {
                if observe {
                    self.record(GetOutcome::Hit);
                }
                Ok(Some(holder.into_value()))
            },
            Ok(None) => {
                if observe {
                    self.record(GetOutcome::Miss);
                }
                Ok(None)
            },
            Err(e) => {
                let decision = self.resilience.get_failure(key, e);
                if observe {
                    self.record(GetOutcome::Failure);
                }
                decision
            },
        }
    }

    /// Runs `remap` against the current value of `key` as one atomic store
    /// step and returns the resulting holder.
    pub(crate) fn compute_one<F>(
        &self,
        key: &K,
        mut remap: F,
    ) -> Result<Option<ValueHolder<V>>, BulkComputeError>
    where
        F: FnMut(Option<Arc<V>>) -> Option<Arc<V>>,
    {
        let mut batch = |entries: BatchMappings<K, V>| -> Result<BatchMappings<K, V>, BoxError> {
            Ok(entries
                .into_iter()
                .map(|(k, current)| {
                    let next = remap(current);
                    (k, next)
                })
                .collect())
        };
        let mut computed = self
            .store
            .bulk_compute(std::slice::from_ref(key), &mut batch)?;
        Ok(computed.pop().and_then(|(_, holder)| holder))
    }
}

impl<K, V> fmt::Debug for CacheBase<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBase")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("bulk_entries", &self.bulk_entries)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CoreCache
// ---------------------------------------------------------------------------

/// Operations common to every cache variant.
///
/// Implementors provide access to their [`CacheBase`] and the two operations
/// whose bookkeeping differs between variants.
///
/// # Example
///
/// ```
/// use guardcache::prelude::*;
///
/// let cache: Cache<u32, String> = CacheBuilder::new(HashMapStore::new()).build();
/// cache.init().unwrap();
/// cache.put(1, "one".to_string()).unwrap();
///
/// assert_eq!(cache.get(&1).unwrap().as_deref(), Some(&"one".to_string()));
/// assert!(cache.contains_key(&1).unwrap());
/// cache.remove(&1).unwrap();
/// assert_eq!(cache.get(&1).unwrap(), None);
/// ```
pub trait CoreCache<K, V>: Send + Sync
where
    K: CacheKey,
    V: CacheValue,
{
    fn base(&self) -> &CacheBase<K, V>;

    /// Removes `key` and records a REMOVE outcome. Returns whether a mapping
    /// was removed.
    fn remove_internal(&self, key: &K) -> Result<bool, CacheError>;

    /// Looks up `keys` in one bulk store step. With `include_absent`, every
    /// requested key is in the result; otherwise only the present ones.
    fn get_all_internal(
        &self,
        keys: &[K],
        include_absent: bool,
    ) -> Result<HashMap<K, Option<Arc<V>>>, CacheError>;

    fn get(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        self.get_no_loader(key)
    }

    /// Looks `key` up in the store without ever invoking a loader.
    fn get_no_loader(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        self.base().lookup(key, true)
    }

    /// Does not record an outcome.
    fn contains_key(&self, key: &K) -> Result<bool, CacheError> {
        let base = self.base();
        base.check_available()?;
        match base.store().contains_key(key) {
            Ok(present) => Ok(present),
            Err(e) => base.resilience().contains_key_failure(key, e),
        }
    }

    fn remove(&self, key: &K) -> Result<(), CacheError> {
        self.remove_internal(key).map(|_| ())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let base = self.base();
        base.check_available()?;
        match base.store().clear() {
            Ok(()) => {
                base.record(ClearOutcome::Success);
                Ok(())
            },
            Err(e) => {
                let decision = base.resilience().clear_failure(e);
                base.record(ClearOutcome::Failure);
                decision
            },
        }
    }

    /// Every requested key, mapped to `None` when absent.
    fn get_all(&self, keys: &[K]) -> Result<HashMap<K, Option<Arc<V>>>, CacheError> {
        self.get_all_internal(keys, true)
    }

    /// Iterates the live entries, recording a GET outcome per step.
    fn iter(&self) -> Result<CacheEntryIter<'_, K, V, Self>, CacheError> {
        self.base().check_available()?;
        Ok(CacheEntryIter::new(self, false))
    }

    /// Iterates the live entries without recording outcomes.
    fn iter_quiet(&self) -> Result<CacheEntryIter<'_, K, V, Self>, CacheError> {
        self.base().check_available()?;
        Ok(CacheEntryIter::new(self, true))
    }

    fn status(&self) -> Status {
        self.base().status()
    }

    fn init(&self) -> Result<(), CacheError> {
        self.base().transitioner().init()
    }

    fn close(&self) -> Result<(), CacheError> {
        self.base().transitioner().close()
    }

    fn add_hook(&self, hook: Arc<dyn LifecycleHook>) -> Result<(), CacheError> {
        self.base().transitioner().add_hook(hook)
    }

    fn remove_hook(&self, hook: &Arc<dyn LifecycleHook>) -> Result<bool, CacheError> {
        self.base().transitioner().remove_hook(hook)
    }

    fn bulk_method_entries(&self) -> BulkEntriesSnapshot {
        self.base().bulk_method_entries()
    }
}
