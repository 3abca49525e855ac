//! Store contract and the stores shipped with the crate.
//!
//! - [`traits`]: the narrow contract the cache consumes.
//! - [`hashmap`]: in-memory reference store.
//! - [`recovery`]: obliterate-by-key adapter used by the resilience strategy.

pub mod hashmap;
pub mod recovery;
pub mod traits;

pub use hashmap::HashMapStore;
pub use recovery::{RecoveryStore, StoreRecovery};
pub use traits::{PutStatus, Store, StoreMetrics, ValueHolder};
