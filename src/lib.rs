//! guardcache: failure-tolerant cache orchestration over pluggable stores.
//!
//! The cache sits between callers and a [`Store`](store::Store). It gates
//! every operation on its lifecycle [`Status`](status::Status), turns store
//! failures into decisions of a [`ResilienceStrategy`](resilience::ResilienceStrategy),
//! reports one outcome per operation and keeps bulk-entry counters. Storage
//! itself, eviction and expiration bookkeeping belong to the store.

pub mod builder;
pub mod cache;
pub mod error;
pub mod expiry;
pub mod metrics;
pub mod prelude;
pub mod resilience;
pub mod status;
pub mod store;
