//! Bulk loading through the store's compute primitives.
//!
//! Two modes share one helper:
//!
//! - absent-only: [`Store::bulk_compute_if_absent`](crate::store::Store::bulk_compute_if_absent) hands the loader only the
//!   keys without a mapping, so present keys are never reloaded;
//! - replace: [`Store::bulk_compute`](crate::store::Store::bulk_compute) hands the loader every key and the
//!   loaded values overwrite whatever was there.
//!
//! Because the store computes atomically per key, two threads loading
//! overlapping key sets never load the same key twice.
//!
//! Loaders may return more or fewer keys than they were asked for.
//! [`normalize_loaded`] brings the result back to exactly the batch.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::base::CacheBase;
use crate::cache::{CacheKey, CacheValue};
use crate::error::{BoxError, CacheError};
use crate::store::traits::BatchMappings;

/// Re-keys a loader result to exactly `keys`, in order. Keys the loader did
/// not return map to `None`; extra keys are dropped.
pub fn normalize_loaded<K, V>(keys: &[K], loaded: HashMap<K, Arc<V>>) -> BatchMappings<K, V>
where
    K: Eq + Hash + Clone,
{
    keys.iter()
        .map(|key| (key.clone(), loaded.get(key).cloned()))
        .collect()
}

/// Loads `keys` into the store and returns every requested key with its
/// resulting value.
///
/// An empty key set returns an empty map without calling the loader. Any
/// failure, in the loader or in the store, surfaces as
/// [`CacheError::Loading`]. Bulk method counters are left untouched in both
/// modes.
pub fn load_all<K, V, F>(
    base: &CacheBase<K, V>,
    keys: &[K],
    replace_existing: bool,
    mut loader: F,
) -> Result<HashMap<K, Option<Arc<V>>>, CacheError>
where
    K: CacheKey,
    V: CacheValue,
    F: FnMut(&[K]) -> Result<HashMap<K, Arc<V>>, BoxError>,
{
    base.check_available()?;
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let mut load = |batch: &[K]| -> Result<BatchMappings<K, V>, BoxError> {
        let loaded = loader(batch)?;
        Ok(normalize_loaded(batch, loaded))
    };

    let computed = if replace_existing {
        base.store()
            .bulk_compute(keys, &mut |entries: BatchMappings<K, V>| {
                let batch: Vec<K> = entries.into_iter().map(|(key, _)| key).collect();
                load(&batch)
            })?
    } else {
        base.store().bulk_compute_if_absent(keys, &mut load)?
    };

    Ok(computed
        .into_iter()
        .map(|(key, holder)| (key, holder.map(|h| h.into_value())))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::expiry::Eternal;
    use crate::metrics::traits::NoopRecorder;
    use crate::resilience::PropagatingResilienceStrategy;
    use crate::store::hashmap::HashMapStore;

    fn base() -> CacheBase<u32, String> {
        let base = CacheBase::new(
            "loader",
            Arc::new(HashMapStore::new()),
            Box::new(PropagatingResilienceStrategy),
            Arc::new(Eternal),
            Arc::new(NoopRecorder),
        );
        base.transitioner().init().unwrap();
        base
    }

    fn echo(keys: &[u32]) -> Result<HashMap<u32, Arc<String>>, BoxError> {
        Ok(keys
            .iter()
            .map(|k| (*k, Arc::new(format!("loaded-{k}"))))
            .collect())
    }

    #[test]
    fn normalize_keeps_exactly_the_requested_keys() {
        let mut loaded = HashMap::new();
        loaded.insert(1, Arc::new("one"));
        loaded.insert(9, Arc::new("nine"));

        let normalized = normalize_loaded(&[1, 2], loaded);
        assert_eq!(normalized, vec![(1, Some(Arc::new("one"))), (2, None)]);
    }

    #[test]
    fn empty_key_set_skips_the_loader() {
        let base = base();
        let result = load_all(&base, &[], false, |_| -> Result<_, BoxError> {
            panic!("loader must not run")
        })
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn absent_only_mode_does_not_reload_present_keys() {
        let base = base();
        base.store().put(1, Arc::new("cached".into())).unwrap();

        let seen = parking_lot::Mutex::new(Vec::new());
        let result = load_all(&base, &[1, 2], false, |keys| {
            seen.lock().extend_from_slice(keys);
            echo(keys)
        })
        .unwrap();

        assert_eq!(*seen.lock(), vec![2]);
        assert_eq!(result[&1].as_deref(), Some(&"cached".to_string()));
        assert_eq!(result[&2].as_deref(), Some(&"loaded-2".to_string()));
    }

    #[test]
    fn replace_mode_overwrites() {
        let base = base();
        base.store().put(1, Arc::new("cached".into())).unwrap();

        let calls = AtomicUsize::new(0);
        let result = load_all(&base, &[1, 2], true, |keys| {
            calls.fetch_add(1, Ordering::SeqCst);
            echo(keys)
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result[&1].as_deref(), Some(&"loaded-1".to_string()));
        assert_eq!(
            base.store().get(&1).unwrap().map(|h| (*h.into_value()).clone()),
            Some("loaded-1".to_string())
        );
    }

    #[test]
    fn loader_failure_surfaces_as_loading_error() {
        let base = base();
        let err = load_all(&base, &[1], false, |_| Err("backend down".into())).unwrap_err();
        match err {
            CacheError::Loading(source) => assert_eq!(source.to_string(), "backend down"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(base.store().get(&1).unwrap().is_none());
    }

    #[test]
    fn missing_loader_keys_map_to_none() {
        let base = base();
        let result = load_all(&base, &[1, 2], false, |_| Ok(HashMap::new())).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.values().all(Option::is_none));
    }
}
