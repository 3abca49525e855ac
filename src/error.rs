//! Error types for the guardcache library.
//!
//! ## Key Components
//!
//! - [`StoreAccessError`]: Raised by a [`Store`](crate::store::traits::Store)
//!   when it cannot serve a call. The cache never lets one of these escape
//!   raw; it is handed to the configured
//!   [`ResilienceStrategy`](crate::resilience::ResilienceStrategy).
//! - [`BulkComputeError`]: Returned by the store's bulk primitives, which can
//!   fail either inside the store or inside the caller-supplied function.
//! - [`CacheError`]: Everything a cache operation can surface to its caller.
//!
//! ## Example Usage
//!
//! ```
//! use guardcache::error::{CacheError, StoreAccessError};
//!
//! let err = StoreAccessError::new("disk offline");
//! assert_eq!(err.to_string(), "store access failed: disk offline");
//!
//! let wrapped = CacheError::Iteration(err);
//! assert!(wrapped.to_string().contains("disk offline"));
//! ```

use std::error::Error as StdError;

use thiserror::Error;

use crate::status::Status;

/// Boxed error used for failures coming from user-supplied code
/// (loaders, expiry policies, lifecycle hooks).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// StoreAccessError
// ---------------------------------------------------------------------------

/// A failure raised by the backing store.
#[derive(Debug, Error)]
#[error("store access failed: {message}")]
pub struct StoreAccessError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StoreAccessError {
    /// Creates a new `StoreAccessError` with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `StoreAccessError` wrapping an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// BulkComputeError
// ---------------------------------------------------------------------------

/// Failure of a bulk compute primitive.
#[derive(Debug, Error)]
pub enum BulkComputeError {
    /// The store itself failed.
    #[error(transparent)]
    Store(#[from] StoreAccessError),
    /// The function passed to the store failed; the store installed nothing
    /// for the batch.
    #[error("bulk compute function failed: {0}")]
    Function(#[source] BoxError),
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The operation was attempted while the cache was not available.
    #[error("cache is not available (status: {0})")]
    Unavailable(Status),

    /// An operation was invoked in a state that does not permit it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A lifecycle hook aborted a transition.
    #[error("{transition} transition failed")]
    Lifecycle {
        transition: &'static str,
        #[source]
        source: BoxError,
    },

    /// The entry iterator has no more elements.
    #[error("no more entries")]
    NoSuchElement,

    /// A bulk load failed, either in the loader or in the store.
    #[error("bulk loading failed: {0}")]
    Loading(#[source] BoxError),

    /// The store failed while iterating.
    #[error("iteration failed: {0}")]
    Iteration(#[source] StoreAccessError),

    /// A store failure propagated by a non-degrading resilience strategy.
    #[error(transparent)]
    Store(StoreAccessError),

    /// A single-key compute function failed.
    #[error("compute function failed: {0}")]
    Compute(#[source] BoxError),
}

impl CacheError {
    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub(crate) fn loading(err: impl Into<BoxError>) -> Self {
        Self::Loading(err.into())
    }
}

impl From<BulkComputeError> for CacheError {
    /// Any failure of a bulk load, store-side or loader-side, is a loading
    /// error from the caller's point of view. A loader that already returned
    /// a `Loading` error keeps it unwrapped.
    fn from(err: BulkComputeError) -> Self {
        match err {
            BulkComputeError::Store(store) => Self::loading(store),
            BulkComputeError::Function(source) => match source.downcast::<CacheError>() {
                Ok(cache_err) => match *cache_err {
                    loading @ Self::Loading(_) => loading,
                    other => Self::loading(other),
                },
                Err(other) => Self::Loading(other),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
