//! Failure handling between the cache and its store.
//!
//! Whenever a store call fails with a [`StoreAccessError`], the cache hands
//! the failure and the call's inputs to its [`ResilienceStrategy`] and
//! returns whatever the strategy decides. `Ok` is a degraded answer given to
//! the caller as if the operation had succeeded (a miss, `false`, a no-op);
//! `Err` propagates.
//!
//! ## Strategies
//!
//! | Strategy                        | Behavior                                          |
//! |---------------------------------|---------------------------------------------------|
//! | `RobustResilienceStrategy`      | obliterate affected keys, log, degrade (default)  |
//! | `PropagatingResilienceStrategy` | surface every failure as `CacheError::Store`      |
//!
//! Iteration failures are the exception to degrading: an iterator cannot
//! invent an entry, so both strategies end the iteration with an error.

use std::fmt::{self, Debug};
use std::sync::Arc;

use tracing::error;

use crate::cache::iter::CacheEntry;
use crate::error::{CacheError, StoreAccessError};
use crate::store::recovery::RecoveryStore;

/// Degraded answer for a failed `get_all`: every requested key with `None`.
pub type GetAllFallback<K, V> = Vec<(K, Option<Arc<V>>)>;

/// One decision per failure category.
pub trait ResilienceStrategy<K, V>: Send + Sync {
    fn get_failure(&self, key: &K, error: StoreAccessError)
    -> Result<Option<Arc<V>>, CacheError>;

    fn contains_key_failure(&self, key: &K, error: StoreAccessError) -> Result<bool, CacheError>;

    fn put_failure(
        &self,
        key: &K,
        value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<(), CacheError>;

    fn remove_failure(&self, key: &K, error: StoreAccessError) -> Result<(), CacheError>;

    fn clear_failure(&self, error: StoreAccessError) -> Result<(), CacheError>;

    fn iterator_failure(&self, error: StoreAccessError) -> Result<CacheEntry<K, V>, CacheError>;

    fn put_if_absent_failure(
        &self,
        key: &K,
        value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError>;

    fn conditional_remove_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
    ) -> Result<bool, CacheError>;

    fn replace_failure(
        &self,
        key: &K,
        value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError>;

    fn conditional_replace_failure(
        &self,
        key: &K,
        old_value: &V,
        new_value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<bool, CacheError>;

    fn get_all_failure(
        &self,
        keys: &[K],
        error: StoreAccessError,
    ) -> Result<GetAllFallback<K, V>, CacheError>;

    fn put_all_failure(
        &self,
        entries: &[(K, Arc<V>)],
        error: StoreAccessError,
    ) -> Result<(), CacheError>;

    fn remove_all_failure(&self, keys: &[K], error: StoreAccessError) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// RobustResilienceStrategy
// ---------------------------------------------------------------------------

/// Default strategy: obliterate, log, degrade.
///
/// Every keyed failure first removes the affected mappings through the
/// [`RecoveryStore`] so a write that failed half-way cannot leave a mapping
/// that is served forever; a failed `clear` removes everything. Then the
/// failure is logged at error level and the degraded result returned.
pub struct RobustResilienceStrategy<K> {
    recovery: Arc<dyn RecoveryStore<K>>,
    obliterate: bool,
}

impl<K> RobustResilienceStrategy<K> {
    pub fn new(recovery: Arc<dyn RecoveryStore<K>>) -> Self {
        Self {
            recovery,
            obliterate: true,
        }
    }

    /// Same logging and degraded results, but leaves the store untouched.
    pub fn without_obliterate(recovery: Arc<dyn RecoveryStore<K>>) -> Self {
        Self {
            recovery,
            obliterate: false,
        }
    }

    pub fn obliterates(&self) -> bool {
        self.obliterate
    }
}

impl<K: Debug> RobustResilienceStrategy<K> {
    fn cleanup(&self, key: &K, cause: &StoreAccessError) {
        if !self.obliterate {
            error!(key = ?key, error = %cause, "store failure, degraded without recovery");
            return;
        }
        match self.recovery.obliterate(key) {
            Ok(()) => error!(key = ?key, error = %cause, "key recovered from store failure"),
            Err(second) => error!(
                key = ?key,
                error = %cause,
                recovery_error = %second,
                "key in possibly inconsistent state"
            ),
        }
    }

    fn cleanup_keys(&self, keys: &[K], cause: &StoreAccessError) {
        if !self.obliterate {
            error!(keys = ?keys, error = %cause, "store failure, degraded without recovery");
            return;
        }
        match self.recovery.obliterate_keys(keys) {
            Ok(()) => error!(keys = ?keys, error = %cause, "keys recovered from store failure"),
            Err(second) => error!(
                keys = ?keys,
                error = %cause,
                recovery_error = %second,
                "keys in possibly inconsistent state"
            ),
        }
    }

    fn cleanup_all(&self, cause: &StoreAccessError) {
        if !self.obliterate {
            error!(error = %cause, "store failure, degraded without recovery");
            return;
        }
        match self.recovery.obliterate_all() {
            Ok(()) => error!(error = %cause, "cache recovered from store failure"),
            Err(second) => error!(
                error = %cause,
                recovery_error = %second,
                "cache in possibly inconsistent state"
            ),
        }
    }
}

impl<K, V> ResilienceStrategy<K, V> for RobustResilienceStrategy<K>
where
    K: Debug + Clone + Send + Sync,
{
    fn get_failure(
        &self,
        key: &K,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError> {
        self.cleanup(key, &error);
        Ok(None)
    }

    fn contains_key_failure(&self, key: &K, error: StoreAccessError) -> Result<bool, CacheError> {
        self.cleanup(key, &error);
        Ok(false)
    }

    fn put_failure(
        &self,
        key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<(), CacheError> {
        self.cleanup(key, &error);
        Ok(())
    }

    fn remove_failure(&self, key: &K, error: StoreAccessError) -> Result<(), CacheError> {
        self.cleanup(key, &error);
        Ok(())
    }

    fn clear_failure(&self, error: StoreAccessError) -> Result<(), CacheError> {
        self.cleanup_all(&error);
        Ok(())
    }

    fn iterator_failure(&self, error: StoreAccessError) -> Result<CacheEntry<K, V>, CacheError> {
        error!(error = %error, "store failure during iteration");
        Err(CacheError::Iteration(error))
    }

    fn put_if_absent_failure(
        &self,
        key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError> {
        self.cleanup(key, &error);
        Ok(None)
    }

    fn conditional_remove_failure(
        &self,
        key: &K,
        _value: &V,
        error: StoreAccessError,
    ) -> Result<bool, CacheError> {
        self.cleanup(key, &error);
        Ok(false)
    }

    fn replace_failure(
        &self,
        key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError> {
        self.cleanup(key, &error);
        Ok(None)
    }

    fn conditional_replace_failure(
        &self,
        key: &K,
        _old_value: &V,
        _new_value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<bool, CacheError> {
        self.cleanup(key, &error);
        Ok(false)
    }

    fn get_all_failure(
        &self,
        keys: &[K],
        error: StoreAccessError,
    ) -> Result<GetAllFallback<K, V>, CacheError> {
        self.cleanup_keys(keys, &error);
        Ok(keys.iter().map(|key| (key.clone(), None)).collect())
    }

    fn put_all_failure(
        &self,
        entries: &[(K, Arc<V>)],
        error: StoreAccessError,
    ) -> Result<(), CacheError> {
        let keys: Vec<K> = entries.iter().map(|(key, _)| key.clone()).collect();
        self.cleanup_keys(&keys, &error);
        Ok(())
    }

    fn remove_all_failure(&self, keys: &[K], error: StoreAccessError) -> Result<(), CacheError> {
        self.cleanup_keys(keys, &error);
        Ok(())
    }
}

impl<K> fmt::Debug for RobustResilienceStrategy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobustResilienceStrategy")
            .field("obliterate", &self.obliterate)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PropagatingResilienceStrategy
// ---------------------------------------------------------------------------

/// Strategy that never degrades: every store failure reaches the caller as
/// [`CacheError::Store`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagatingResilienceStrategy;

impl<K, V> ResilienceStrategy<K, V> for PropagatingResilienceStrategy {
    fn get_failure(&self, _key: &K, error: StoreAccessError) -> Result<Option<Arc<V>>, CacheError> {
        Err(CacheError::Store(error))
    }

    fn contains_key_failure(&self, _key: &K, error: StoreAccessError) -> Result<bool, CacheError> {
        Err(CacheError::Store(error))
    }

    fn put_failure(
        &self,
        _key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<(), CacheError> {
        Err(CacheError::Store(error))
    }

    fn remove_failure(&self, _key: &K, error: StoreAccessError) -> Result<(), CacheError> {
        Err(CacheError::Store(error))
    }

    fn clear_failure(&self, error: StoreAccessError) -> Result<(), CacheError> {
        Err(CacheError::Store(error))
    }

    fn iterator_failure(&self, error: StoreAccessError) -> Result<CacheEntry<K, V>, CacheError> {
        Err(CacheError::Iteration(error))
    }

    fn put_if_absent_failure(
        &self,
        _key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError> {
        Err(CacheError::Store(error))
    }

    fn conditional_remove_failure(
        &self,
        _key: &K,
        _value: &V,
        error: StoreAccessError,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Store(error))
    }

    fn replace_failure(
        &self,
        _key: &K,
        _value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<Option<Arc<V>>, CacheError> {
        Err(CacheError::Store(error))
    }

    fn conditional_replace_failure(
        &self,
        _key: &K,
        _old_value: &V,
        _new_value: &Arc<V>,
        error: StoreAccessError,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Store(error))
    }

    fn get_all_failure(
        &self,
        _keys: &[K],
        error: StoreAccessError,
    ) -> Result<GetAllFallback<K, V>, CacheError> {
        Err(CacheError::Store(error))
    }

    fn put_all_failure(
        &self,
        _entries: &[(K, Arc<V>)],
        error: StoreAccessError,
    ) -> Result<(), CacheError> {
        Err(CacheError::Store(error))
    }

    fn remove_all_failure(&self, _keys: &[K], error: StoreAccessError) -> Result<(), CacheError> {
        Err(CacheError::Store(error))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records what it was asked to obliterate.
    #[derive(Default)]
    struct Recorder {
        obliterated: Mutex<Vec<u32>>,
        cleared: Mutex<usize>,
        fail: bool,
    }

    impl RecoveryStore<u32> for Recorder {
        fn obliterate_all(&self) -> Result<(), StoreAccessError> {
            *self.cleared.lock() += 1;
            Ok(())
        }

        fn obliterate(&self, key: &u32) -> Result<(), StoreAccessError> {
            if self.fail {
                return Err(StoreAccessError::new("still down"));
            }
            self.obliterated.lock().push(*key);
            Ok(())
        }
    }

    fn failure() -> StoreAccessError {
        StoreAccessError::new("boom")
    }

    #[test]
    fn robust_degrades_and_obliterates() {
        let recovery = Arc::new(Recorder::default());
        let strategy: RobustResilienceStrategy<u32> = RobustResilienceStrategy::new(recovery.clone());

        let got: Option<Arc<String>> = strategy.get_failure(&1, failure()).unwrap();
        assert!(got.is_none());
        assert!(!ResilienceStrategy::<u32, String>::contains_key_failure(&strategy, &2, failure())
            .unwrap());
        ResilienceStrategy::<u32, String>::remove_failure(&strategy, &3, failure()).unwrap();
        strategy
            .put_failure(&4, &Arc::new("v".to_string()), failure())
            .unwrap();
        assert!(
            !strategy
                .conditional_replace_failure(&5, &"a".to_string(), &Arc::new("b".into()), failure())
                .unwrap()
        );

        assert_eq!(*recovery.obliterated.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn robust_clear_failure_obliterates_everything() {
        let recovery = Arc::new(Recorder::default());
        let strategy: RobustResilienceStrategy<u32> = RobustResilienceStrategy::new(recovery.clone());
        ResilienceStrategy::<u32, String>::clear_failure(&strategy, failure()).unwrap();
        assert_eq!(*recovery.cleared.lock(), 1);
    }

    #[test]
    fn robust_get_all_failure_maps_every_key_to_none() {
        let recovery = Arc::new(Recorder::default());
        let strategy: RobustResilienceStrategy<u32> = RobustResilienceStrategy::new(recovery.clone());
        let result: GetAllFallback<u32, String> =
            strategy.get_all_failure(&[7, 8], failure()).unwrap();
        assert_eq!(result, vec![(7, None), (8, None)]);
        assert_eq!(*recovery.obliterated.lock(), vec![7, 8]);
    }

    #[test]
    fn robust_iterator_failure_is_raised() {
        let strategy: RobustResilienceStrategy<u32> =
            RobustResilienceStrategy::new(Arc::new(Recorder::default()));
        let result: Result<CacheEntry<u32, String>, _> = strategy.iterator_failure(failure());
        assert!(matches!(result, Err(CacheError::Iteration(_))));
    }

    #[test]
    fn robust_survives_failing_recovery() {
        let recovery = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let strategy: RobustResilienceStrategy<u32> = RobustResilienceStrategy::new(recovery.clone());
        let got: Option<Arc<String>> = strategy.get_failure(&1, failure()).unwrap();
        assert!(got.is_none());
        assert!(recovery.obliterated.lock().is_empty());
    }

    #[test]
    fn without_obliterate_leaves_store_alone() {
        let recovery = Arc::new(Recorder::default());
        let strategy: RobustResilienceStrategy<u32> =
            RobustResilienceStrategy::without_obliterate(recovery.clone());
        assert!(!strategy.obliterates());
        ResilienceStrategy::<u32, String>::remove_failure(&strategy, &1, failure()).unwrap();
        ResilienceStrategy::<u32, String>::clear_failure(&strategy, failure()).unwrap();
        assert!(recovery.obliterated.lock().is_empty());
        assert_eq!(*recovery.cleared.lock(), 0);
    }

    #[test]
    fn propagating_surfaces_store_errors() {
        let strategy = PropagatingResilienceStrategy;
        let got: Result<Option<Arc<String>>, _> = strategy.get_failure(&1u32, failure());
        assert!(matches!(got, Err(CacheError::Store(_))));
        let cleared = ResilienceStrategy::<u32, String>::clear_failure(&strategy, failure());
        assert!(matches!(cleared, Err(CacheError::Store(_))));
    }
}
