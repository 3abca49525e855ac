//! Corrective removal of mappings after a failed store call.
//!
//! When a store call fails half-way, the mapping it touched may be left in
//! an unknown state. The resilience strategy "obliterates" such mappings so
//! they cannot be served stale forever.

use std::fmt;
use std::sync::Arc;

use crate::error::StoreAccessError;
use crate::store::traits::Store;

/// Forcible removal of mappings.
pub trait RecoveryStore<K>: Send + Sync {
    /// Remove every mapping.
    fn obliterate_all(&self) -> Result<(), StoreAccessError>;

    /// Remove the mapping for `key`.
    fn obliterate(&self, key: &K) -> Result<(), StoreAccessError>;

    /// Remove the mappings for `keys`, stopping at the first failure.
    fn obliterate_keys(&self, keys: &[K]) -> Result<(), StoreAccessError> {
        for key in keys {
            self.obliterate(key)?;
        }
        Ok(())
    }
}

/// [`RecoveryStore`] implemented with a store's own `clear` and `remove`.
pub struct StoreRecovery<K, V> {
    store: Arc<dyn Store<K, V>>,
}

impl<K, V> StoreRecovery<K, V> {
    pub fn new(store: Arc<dyn Store<K, V>>) -> Self {
        Self { store }
    }
}

impl<K, V> RecoveryStore<K> for StoreRecovery<K, V> {
    fn obliterate_all(&self) -> Result<(), StoreAccessError> {
        self.store.clear()
    }

    fn obliterate(&self, key: &K) -> Result<(), StoreAccessError> {
        self.store.remove(key).map(|_| ())
    }
}

impl<K, V> fmt::Debug for StoreRecovery<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRecovery").finish_non_exhaustive()
    }
}
