pub use crate::builder::CacheBuilder;
pub use crate::cache::{Cache, CacheEntry, CacheEntryIter, CoreCache};
pub use crate::error::{BoxError, CacheError, StoreAccessError};
pub use crate::expiry::{Eternal, ExpiryPolicy, TimeToLive};
pub use crate::metrics::{BulkOps, OutcomeCounters, OutcomeRecorder};
pub use crate::resilience::{
    PropagatingResilienceStrategy, ResilienceStrategy, RobustResilienceStrategy,
};
pub use crate::status::{LifecycleHook, Status};
pub use crate::store::{HashMapStore, Store};
