// ==============================================
// SHARED TEST FIXTURES
// ==============================================
//
// `FlakyStore` wraps a `HashMapStore` and fails chosen operations on demand,
// counts calls, and can make the raw iterator report failures or keys the
// store does not actually hold.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use guardcache::builder::CacheBuilder;
use guardcache::cache::Cache;
use guardcache::error::{BulkComputeError, StoreAccessError};
use guardcache::metrics::OutcomeCounters;
use guardcache::store::traits::{BulkLoadFn, BulkRemapFn, PutStatus, StoreIter};
use guardcache::store::{HashMapStore, Store, ValueHolder};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    ContainsKey,
    Put,
    Remove,
    Clear,
    Iter,
    ComputeIfAbsent,
    Compute,
}

pub struct FlakyStore<K, V> {
    inner: HashMapStore<K, V>,
    failing: Mutex<HashSet<Op>>,
    calls: Mutex<HashMap<Op, usize>>,
    iter_fail_after: Mutex<Option<usize>>,
    phantoms: Mutex<Vec<(K, Arc<V>)>>,
}

impl<K, V> FlakyStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: HashMapStore::new(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            iter_fail_after: Mutex::new(None),
            phantoms: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().remove(&op);
    }

    /// The raw iterator yields `n` entries, then one failure.
    pub fn fail_iteration_after(&self, n: usize) {
        *self.iter_fail_after.lock() = Some(n);
    }

    /// The raw iterator reports `key` first although no mapping exists.
    pub fn add_phantom(&self, key: K, value: V) {
        self.phantoms.lock().push((key, Arc::new(value)));
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn inner(&self) -> &HashMapStore<K, V> {
        &self.inner
    }

    fn enter(&self, op: Op) -> Result<(), StoreAccessError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.failing.lock().contains(&op) {
            return Err(StoreAccessError::new(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

impl<K, V> Store<K, V> for FlakyStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError> {
        self.enter(Op::Get)?;
        self.inner.get(key)
    }

    fn contains_key(&self, key: &K) -> Result<bool, StoreAccessError> {
        self.enter(Op::ContainsKey)?;
        self.inner.contains_key(key)
    }

    fn put(&self, key: K, value: Arc<V>) -> Result<PutStatus, StoreAccessError> {
        self.enter(Op::Put)?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &K) -> Result<bool, StoreAccessError> {
        self.enter(Op::Remove)?;
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        self.enter(Op::Clear)?;
        self.inner.clear()
    }

    fn iter(&self) -> StoreIter<'_, K, V> {
        if let Err(e) = self.enter(Op::Iter) {
            return Box::new(std::iter::once(Err(e)));
        }
        let phantoms: Vec<_> = self
            .phantoms
            .lock()
            .iter()
            .map(|(k, v)| Ok((k.clone(), ValueHolder::eternal(Arc::clone(v)))))
            .collect();
        let mut steps: Vec<_> = phantoms.into_iter().chain(self.inner.iter()).collect();
        if let Some(n) = *self.iter_fail_after.lock() {
            steps.truncate(n);
            steps.push(Err(StoreAccessError::new("injected iteration failure")));
        }
        Box::new(steps.into_iter())
    }

    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        loader: &mut BulkLoadFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        self.enter(Op::ComputeIfAbsent)?;
        self.inner.bulk_compute_if_absent(keys, loader)
    }

    fn bulk_compute(
        &self,
        keys: &[K],
        remapper: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, BulkComputeError> {
        self.enter(Op::Compute)?;
        self.inner.bulk_compute(keys, remapper)
    }
}

/// A flaky store, a cache over it with the default strategy, and the
/// outcome counters the cache reports to. The cache is initialized.
pub fn flaky_cache() -> (Arc<FlakyStore<u32, String>>, Cache<u32, String>, Arc<OutcomeCounters>) {
    flaky_cache_with(|builder| builder)
}

/// Like [`flaky_cache`], letting the test adjust the builder first.
pub fn flaky_cache_with(
    configure: impl FnOnce(CacheBuilder<u32, String>) -> CacheBuilder<u32, String>,
) -> (Arc<FlakyStore<u32, String>>, Cache<u32, String>, Arc<OutcomeCounters>) {
    let store = Arc::new(FlakyStore::new());
    let counters = Arc::new(OutcomeCounters::new());
    let shared: Arc<dyn Store<u32, String>> = store.clone();
    let builder = CacheBuilder::with_shared_store(shared)
        .name("flaky")
        .outcome_recorder(counters.clone());
    let cache = configure(builder).build();
    cache_init(&cache);
    (store, cache, counters)
}

pub fn cache_init(cache: &Cache<u32, String>) {
    use guardcache::cache::CoreCache;
    cache.init().expect("init");
}

pub fn s(v: &str) -> String {
    v.to_string()
}
