//! # Cache Orchestration
//!
//! ```text
//!   caller ──▶ CoreCache op ──▶ check_available ──▶ Store call
//!                                                      │
//!                                  ┌───────────────────┴───────────────────┐
//!                                  ▼                                       ▼
//!                           Ok: interpret                  Err: ResilienceStrategy
//!                                  │                                       │
//!                                  └──────────▶ record outcome ◀───────────┘
//!                                                      │
//!                                                      ▼
//!                                                return value
//! ```
//!
//! ## Pieces
//!
//! | Item              | Role                                                      |
//! |-------------------|-----------------------------------------------------------|
//! | `CacheBase`       | state shared by every variant: store, strategy, counters  |
//! | `CoreCache`       | variant seam plus the operations common to all variants   |
//! | `CacheEntryIter`  | lazy, failure-tolerant entry iterator                     |
//! | `loader`          | bulk load helpers (absent-only, replace)                  |
//! | `Cache`           | plain variant without loader/writer                       |

use std::fmt::Debug;
use std::hash::Hash;

pub mod base;
pub mod iter;
pub mod loader;
pub mod plain;

pub use base::{CacheBase, CoreCache};
pub use iter::{CacheEntry, CacheEntryIter};
pub use loader::normalize_loaded;
pub use plain::Cache;

/// Bounds every cache key satisfies.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Bounds every cache value satisfies.
pub trait CacheValue: Send + Sync + 'static {}

impl<T> CacheValue for T where T: Send + Sync + 'static {}
