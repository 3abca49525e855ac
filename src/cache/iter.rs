//! Entry iteration.
//!
//! [`CacheEntryIter`] walks the raw store iteration with a single-slot
//! lookahead. Every raw entry is re-resolved through the cache before it is
//! offered, so mappings that expired or were removed after the store
//! iteration started are skipped. A failure during the walk is held back
//! and surfaced on the next call to [`CacheEntryIter::next_entry`], which
//! ends the iteration. A failed raw step goes to the resilience strategy
//! there; a failed re-resolution was already decided by the strategy's
//! `get_failure` and is returned as is.

use std::fmt;
use std::sync::Arc;

use crate::cache::base::CoreCache;
use crate::cache::{CacheKey, CacheValue};
use crate::error::{CacheError, StoreAccessError};

/// Failure held back until the next `next_entry` call.
enum Pending {
    /// The raw store cursor failed; not yet seen by the strategy.
    Cursor(StoreAccessError),
    /// Re-resolving a key failed and the strategy already decided.
    Decided(CacheError),
}
use crate::metrics::outcome::GetOutcome;
use crate::store::traits::StoreIter;

/// One live mapping yielded by iteration.
#[derive(Debug, PartialEq, Eq)]
pub struct CacheEntry<K, V> {
    key: K,
    value: Arc<V>,
}

impl<K, V> CacheEntry<K, V> {
    pub fn new(key: K, value: Arc<V>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    pub fn into_parts(self) -> (K, Arc<V>) {
        (self.key, self.value)
    }
}

impl<K: Clone, V> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

/// Lazy iterator over the live entries of a cache.
///
/// Besides the [`Iterator`] impl, which yields `Result` items and stops after
/// the first error, it offers the explicit protocol `has_next` /
/// `next_entry` / `remove`.
pub struct CacheEntryIter<'a, K, V, C: ?Sized> {
    cache: &'a C,
    raw: StoreIter<'a, K, V>,
    next: Option<CacheEntry<K, V>>,
    current: Option<K>,
    failure: Option<Pending>,
    quiet: bool,
    terminated: bool,
}

impl<'a, K, V, C> CacheEntryIter<'a, K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: CoreCache<K, V> + ?Sized,
{
    pub(crate) fn new(cache: &'a C, quiet: bool) -> Self {
        let raw = cache.base().store().iter();
        let mut iter = Self {
            cache,
            raw,
            next: None,
            current: None,
            failure: None,
            quiet,
            terminated: false,
        };
        iter.advance();
        iter
    }

    /// Moves the lookahead to the next raw entry that is still live.
    ///
    /// The liveness read records no GET outcome, so a fetched entry counts
    /// as exactly one hit.
    fn advance(&mut self) {
        self.next = None;
        if self.terminated {
            return;
        }
        for step in self.raw.by_ref() {
            let key = match step {
                Ok((key, _)) => key,
                Err(e) => {
                    self.failure = Some(Pending::Cursor(e));
                    return;
                },
            };
            match self.cache.base().lookup(&key, false) {
                Ok(Some(value)) => {
                    self.next = Some(CacheEntry::new(key, value));
                    return;
                },
                Ok(None) => continue,
                Err(decided) => {
                    self.failure = Some(Pending::Decided(decided));
                    return;
                },
            }
        }
    }

    /// Whether another call to [`next_entry`](Self::next_entry) will yield an
    /// entry or surface a held-back failure.
    pub fn has_next(&self) -> Result<bool, CacheError> {
        self.cache.base().check_available()?;
        Ok(!self.terminated && (self.failure.is_some() || self.next.is_some()))
    }

    pub fn next_entry(&mut self) -> Result<CacheEntry<K, V>, CacheError> {
        if !self.has_next()? {
            return Err(CacheError::NoSuchElement);
        }
        let base = self.cache.base();

        if let Some(pending) = self.failure.take() {
            self.terminated = true;
            self.current = None;
            if !self.quiet {
                base.record(GetOutcome::Failure);
            }
            return match pending {
                Pending::Cursor(e) => base.resilience().iterator_failure(e),
                Pending::Decided(e) => Err(e),
            };
        }

        let entry = self.next.take().ok_or(CacheError::NoSuchElement)?;
        if !self.quiet {
            base.record(GetOutcome::Hit);
        }
        self.current = Some(entry.key().clone());
        self.advance();
        Ok(entry)
    }

    /// Removes the entry last returned by `next_entry`.
    pub fn remove(&mut self) -> Result<(), CacheError> {
        self.cache.base().check_available()?;
        let key = self.current.take().ok_or_else(|| {
            CacheError::illegal_state("remove() needs a preceding call to next_entry()")
        })?;
        self.cache.remove(&key)
    }
}

impl<K, V, C> Iterator for CacheEntryIter<'_, K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: CoreCache<K, V> + ?Sized,
{
    type Item = Result<CacheEntry<K, V>, CacheError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(CacheError::NoSuchElement) => None,
            Err(e) => {
                self.terminated = true;
                Some(Err(e))
            },
        }
    }
}

impl<K: fmt::Debug, V, C: ?Sized> fmt::Debug for CacheEntryIter<'_, K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntryIter")
            .field("current", &self.current)
            .field("pending_failure", &self.failure.is_some())
            .field("quiet", &self.quiet)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}
