//! Expiry policies and the "already expired" check.
//!
//! An [`ExpiryPolicy`] tells the store how long a mapping lives after it is
//! created or updated. The cache itself only asks one question of the
//! policy, through [`new_value_already_expired`]: would this value be dead
//! on arrival? A zero duration means the value must never be stored or
//! returned.
//!
//! A policy that fails is treated as returning [`Duration::ZERO`], so a
//! broken policy cannot keep values around forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::error;

use crate::error::BoxError;

/// Computes entry lifetimes.
pub trait ExpiryPolicy<K, V>: Send + Sync {
    /// Lifetime of a newly created mapping. [`Duration::MAX`] means eternal.
    fn expiry_for_creation(&self, key: &K, value: &V) -> Result<Duration, BoxError>;

    /// Lifetime after an update. `None` leaves the current expiration as is.
    fn expiry_for_update(
        &self,
        key: &K,
        old_value: &dyn Fn() -> Arc<V>,
        new_value: &V,
    ) -> Result<Option<Duration>, BoxError>;
}

/// Mappings never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eternal;

impl<K, V> ExpiryPolicy<K, V> for Eternal {
    fn expiry_for_creation(&self, _key: &K, _value: &V) -> Result<Duration, BoxError> {
        Ok(Duration::MAX)
    }

    fn expiry_for_update(
        &self,
        _key: &K,
        _old_value: &dyn Fn() -> Arc<V>,
        _new_value: &V,
    ) -> Result<Option<Duration>, BoxError> {
        Ok(None)
    }
}

/// Mappings expire a fixed time after their last write.
#[derive(Debug, Clone, Copy)]
pub struct TimeToLive(pub Duration);

impl<K, V> ExpiryPolicy<K, V> for TimeToLive {
    fn expiry_for_creation(&self, _key: &K, _value: &V) -> Result<Duration, BoxError> {
        Ok(self.0)
    }

    fn expiry_for_update(
        &self,
        _key: &K,
        _old_value: &dyn Fn() -> Arc<V>,
        _new_value: &V,
    ) -> Result<Option<Duration>, BoxError> {
        Ok(Some(self.0))
    }
}

/// Returns `true` when `new_value` would be expired the moment it is written.
///
/// Asks for the creation duration when there is no `old_value`, the update
/// duration otherwise.
pub fn new_value_already_expired<K, V>(
    expiry: &dyn ExpiryPolicy<K, V>,
    key: &K,
    old_value: Option<&Arc<V>>,
    new_value: &V,
) -> bool {
    let duration = match old_value {
        None => expiry.expiry_for_creation(key, new_value).map(Some),
        Some(old) => expiry.expiry_for_update(key, &|| old.clone(), new_value),
    };

    match duration {
        Ok(duration) => duration == Some(Duration::ZERO),
        Err(err) => {
            error!(error = %err, "expiry computation failed, expiry duration will be 0");
            true
        },
    }
}

// ---------------------------------------------------------------------------
// Time sources
// ---------------------------------------------------------------------------

/// Millisecond clock used by stores to stamp and expire mappings.
pub trait TimeSource: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::Relaxed);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Absolute expiration time for a mapping written at `now` that lives for
/// `ttl`. `None` means it never expires.
pub(crate) fn expiration_time(now: u64, ttl: Duration) -> Option<u64> {
    if ttl == Duration::MAX {
        return None;
    }
    let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    Some(now.saturating_add(ttl_millis))
}
