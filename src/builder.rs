//! Cache builder.
//!
//! Assembles a [`Cache`] around a store, hiding the wiring between the store,
//! the default resilience strategy and the statistics sinks.
//!
//! ## Defaults
//!
//! | Setting            | Default                                                 |
//! |--------------------|---------------------------------------------------------|
//! | name               | `"cache"`                                               |
//! | expiry             | [`Eternal`]                                             |
//! | resilience         | [`RobustResilienceStrategy`] over the same store        |
//! | outcome recorder   | a fresh [`OutcomeCounters`]                             |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use guardcache::builder::CacheBuilder;
//! use guardcache::cache::CoreCache;
//! use guardcache::expiry::{SystemTimeSource, TimeToLive};
//! use guardcache::store::HashMapStore;
//!
//! // The store expires mappings; the cache uses the same policy to drop
//! // values that would be dead on arrival.
//! let ttl = Arc::new(TimeToLive(Duration::from_secs(60)));
//! let store = HashMapStore::<u64, String>::with_expiry(ttl.clone(), Arc::new(SystemTimeSource));
//!
//! let cache = CacheBuilder::new(store)
//!     .name("sessions")
//!     .expiry(ttl)
//!     .build();
//! cache.init().unwrap();
//! cache.put(1, "hello".to_string()).unwrap();
//! assert_eq!(cache.get(&1).unwrap().as_deref(), Some(&"hello".to_string()));
//! ```

use std::sync::Arc;

use crate::cache::base::CacheBase;
use crate::cache::plain::Cache;
use crate::cache::{CacheKey, CacheValue};
use crate::expiry::{Eternal, ExpiryPolicy};
use crate::metrics::counters::OutcomeCounters;
use crate::metrics::traits::OutcomeRecorder;
use crate::resilience::{ResilienceStrategy, RobustResilienceStrategy};
use crate::store::recovery::StoreRecovery;
use crate::store::traits::Store;

/// Builder for [`Cache`] instances.
pub struct CacheBuilder<K, V> {
    store: Arc<dyn Store<K, V>>,
    name: String,
    expiry: Option<Arc<dyn ExpiryPolicy<K, V>>>,
    resilience: Option<Box<dyn ResilienceStrategy<K, V>>>,
    recorder: Option<Arc<dyn OutcomeRecorder>>,
    obliterate: bool,
}

impl<K, V> CacheBuilder<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    pub fn new(store: impl Store<K, V> + 'static) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Builds around a store that is also used elsewhere.
    pub fn with_shared_store(store: Arc<dyn Store<K, V>>) -> Self {
        Self {
            store,
            name: "cache".to_string(),
            expiry: None,
            resilience: None,
            recorder: None,
            obliterate: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Policy consulted to drop values that would be expired on arrival.
    ///
    /// This does not make mappings expire later on: lifetimes are tracked
    /// by the store, e.g. [`HashMapStore::with_expiry`]. Hand both the same
    /// policy to keep them consistent.
    ///
    /// [`HashMapStore::with_expiry`]: crate::store::HashMapStore::with_expiry
    pub fn expiry(mut self, expiry: Arc<dyn ExpiryPolicy<K, V>>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Replaces the default [`RobustResilienceStrategy`].
    pub fn resilience(mut self, strategy: Box<dyn ResilienceStrategy<K, V>>) -> Self {
        self.resilience = Some(strategy);
        self
    }

    /// Keeps the default strategy but stops it from obliterating keys after
    /// a store failure. Ignored when a custom strategy is set.
    pub fn without_obliterate(mut self) -> Self {
        self.obliterate = false;
        self
    }

    pub fn outcome_recorder(mut self, recorder: Arc<dyn OutcomeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Builds an uninitialized cache.
    pub fn build(self) -> Cache<K, V> {
        let resilience: Box<dyn ResilienceStrategy<K, V>> = match self.resilience {
            Some(strategy) => strategy,
            None => {
                let recovery = Arc::new(StoreRecovery::new(Arc::clone(&self.store)));
                if self.obliterate {
                    Box::new(RobustResilienceStrategy::new(recovery))
                } else {
                    Box::new(RobustResilienceStrategy::without_obliterate(recovery))
                }
            },
        };
        let expiry: Arc<dyn ExpiryPolicy<K, V>> = match self.expiry {
            Some(expiry) => expiry,
            None => Arc::new(Eternal),
        };
        let recorder: Arc<dyn OutcomeRecorder> = match self.recorder {
            Some(recorder) => recorder,
            None => Arc::new(OutcomeCounters::new()),
        };

        Cache::from_base(CacheBase::new(
            self.name, self.store, resilience, expiry, recorder,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::base::CoreCache;
    use crate::status::Status;
    use crate::store::hashmap::HashMapStore;

    #[test]
    fn builds_uninitialized_cache_with_defaults() {
        let cache: Cache<u32, String> = CacheBuilder::new(HashMapStore::new()).build();
        assert_eq!(cache.name(), "cache");
        assert_eq!(cache.status(), Status::Uninitialized);

        cache.init().unwrap();
        cache.put(1, "one".to_string()).unwrap();
        assert_eq!(cache.get(&1).unwrap().as_deref(), Some(&"one".to_string()));
    }

    #[test]
    fn shared_store_is_visible_to_the_cache() {
        let store: Arc<dyn Store<u32, String>> = Arc::new(HashMapStore::new());
        store.put(7, Arc::new("seeded".into())).unwrap();

        let cache = CacheBuilder::with_shared_store(Arc::clone(&store))
            .name("shared")
            .without_obliterate()
            .build();
        cache.init().unwrap();
        assert_eq!(cache.name(), "shared");
        assert!(cache.contains_key(&7).unwrap());
    }
}
