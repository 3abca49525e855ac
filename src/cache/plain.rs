use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::cache::base::{CacheBase, CoreCache};
use crate::cache::loader;
use crate::cache::{CacheKey, CacheValue};
use crate::error::{BoxError, BulkComputeError, CacheError, StoreAccessError};
use crate::metrics::counters::BulkOps;
use crate::metrics::outcome::{
    ConditionalRemoveOutcome, GetAllOutcome, PutAllOutcome, PutIfAbsentOutcome, PutOutcome,
    RemoveAllOutcome, RemoveOutcome, ReplaceOutcome,
};
use crate::store::traits::BatchMappings;

/// Cache variant without loader or writer.
///
/// Built with [`CacheBuilder`](crate::builder::CacheBuilder). Starts
/// uninitialized; call [`init`](CoreCache::init) before use.
pub struct Cache<K, V> {
    base: CacheBase<K, V>,
}

/// Splits a single-key compute failure into the store part, which goes to
/// the resilience strategy, and the function part, which never does.
fn store_part(err: BulkComputeError) -> Result<StoreAccessError, CacheError> {
    match err {
        BulkComputeError::Store(e) => Ok(e),
        BulkComputeError::Function(e) => Err(CacheError::Compute(e)),
    }
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    pub(crate) fn from_base(base: CacheBase<K, V>) -> Self {
        Self { base }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Installs or overwrites the mapping for `key`.
    ///
    /// A value that is already expired under the cache's expiry policy is
    /// never stored; any previous mapping is removed and NOOP is recorded.
    pub fn put(&self, key: K, value: impl Into<Arc<V>>) -> Result<(), CacheError> {
        let base = &self.base;
        base.check_available()?;
        let value = value.into();

        let computed = base.compute_one(&key, |current| {
            if base.new_value_already_expired(&key, current.as_ref(), &value) {
                None
            } else {
                Some(Arc::clone(&value))
            }
        });

        match computed {
            Ok(Some(_)) => {
                base.record(PutOutcome::Put);
                Ok(())
            },
            Ok(None) => {
                base.record(PutOutcome::Noop);
                Ok(())
            },
            Err(err) => {
                let decision =
                    store_part(err).and_then(|e| base.resilience().put_failure(&key, &value, e));
                base.record(PutOutcome::Failure);
                decision
            },
        }
    }

    /// Installs `value` unless `key` is mapped. Returns the existing value,
    /// or `None` when this call installed (or tried to install) the mapping.
    pub fn put_if_absent(
        &self,
        key: K,
        value: impl Into<Arc<V>>,
    ) -> Result<Option<Arc<V>>, CacheError> {
        let base = &self.base;
        base.check_available()?;
        let value = value.into();

        let mut existing = None;
        let computed = base.compute_one(&key, |current| match current {
            Some(current) => {
                existing = Some(Arc::clone(&current));
                Some(current)
            },
            None if base.new_value_already_expired(&key, None, &value) => None,
            None => Some(Arc::clone(&value)),
        });

        match computed {
            Ok(_) => {
                if existing.is_some() {
                    base.record(PutIfAbsentOutcome::Hit);
                } else {
                    base.record(PutIfAbsentOutcome::Put);
                }
                Ok(existing)
            },
            Err(err) => {
                let decision = store_part(err)
                    .and_then(|e| base.resilience().put_if_absent_failure(&key, &value, e));
                base.record(PutIfAbsentOutcome::Failure);
                decision
            },
        }
    }

    /// Removes `key` only while it maps to `value`.
    pub fn remove_if(&self, key: &K, value: &V) -> Result<bool, CacheError>
    where
        V: PartialEq,
    {
        let base = &self.base;
        base.check_available()?;

        let mut outcome = ConditionalRemoveOutcome::FailureKeyMissing;
        let computed = base.compute_one(key, |current| match current {
            None => {
                outcome = ConditionalRemoveOutcome::FailureKeyMissing;
                None
            },
            Some(current) if *current == *value => {
                outcome = ConditionalRemoveOutcome::Success;
                None
            },
            Some(current) => {
                outcome = ConditionalRemoveOutcome::FailureKeyPresent;
                Some(current)
            },
        });

        match computed {
            Ok(_) => {
                base.record(outcome);
                Ok(outcome == ConditionalRemoveOutcome::Success)
            },
            Err(err) => {
                let decision = store_part(err)
                    .and_then(|e| base.resilience().conditional_remove_failure(key, value, e));
                base.record(ConditionalRemoveOutcome::Failure);
                decision
            },
        }
    }

    /// Replaces the value of `key` if it is mapped. Returns the previous
    /// value.
    pub fn replace(
        &self,
        key: K,
        value: impl Into<Arc<V>>,
    ) -> Result<Option<Arc<V>>, CacheError> {
        let base = &self.base;
        base.check_available()?;
        let value = value.into();

        let mut previous = None;
        let computed = base.compute_one(&key, |current| {
            let current = current?;
            let expired = base.new_value_already_expired(&key, Some(&current), &value);
            previous = Some(current);
            (!expired).then(|| Arc::clone(&value))
        });

        match computed {
            Ok(_) => {
                if previous.is_some() {
                    base.record(ReplaceOutcome::Hit);
                } else {
                    base.record(ReplaceOutcome::MissNotPresent);
                }
                Ok(previous)
            },
            Err(err) => {
                let decision = store_part(err)
                    .and_then(|e| base.resilience().replace_failure(&key, &value, e));
                base.record(ReplaceOutcome::Failure);
                decision
            },
        }
    }

    /// Replaces the value of `key` only while it maps to `old_value`.
    pub fn replace_if(
        &self,
        key: K,
        old_value: &V,
        new_value: impl Into<Arc<V>>,
    ) -> Result<bool, CacheError>
    where
        V: PartialEq,
    {
        let base = &self.base;
        base.check_available()?;
        let new_value = new_value.into();

        let mut outcome = ReplaceOutcome::MissNotPresent;
        let computed = base.compute_one(&key, |current| match current {
            None => {
                outcome = ReplaceOutcome::MissNotPresent;
                None
            },
            Some(current) if *current == *old_value => {
                outcome = ReplaceOutcome::Hit;
                if base.new_value_already_expired(&key, Some(&current), &new_value) {
                    None
                } else {
                    Some(Arc::clone(&new_value))
                }
            },
            Some(current) => {
                outcome = ReplaceOutcome::MissPresent;
                Some(current)
            },
        });

        match computed {
            Ok(_) => {
                base.record(outcome);
                Ok(outcome == ReplaceOutcome::Hit)
            },
            Err(err) => {
                let decision = store_part(err).and_then(|e| {
                    base.resilience()
                        .conditional_replace_failure(&key, old_value, &new_value, e)
                });
                base.record(ReplaceOutcome::Failure);
                decision
            },
        }
    }

    /// Writes every entry in one bulk store step. For duplicate keys the last
    /// value wins.
    pub fn put_all<I, W>(&self, entries: I) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (K, W)>,
        W: Into<Arc<V>>,
    {
        let base = &self.base;
        base.check_available()?;

        let entries: Vec<(K, Arc<V>)> = entries
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect();
        let mut pending: FxHashMap<K, Arc<V>> = entries.iter().cloned().collect();
        let keys: Vec<K> = dedup(entries.iter().map(|(key, _)| key));

        let mut puts = 0u64;
        let mut updates = 0u64;
        let mut remap = |batch: BatchMappings<K, V>| -> Result<BatchMappings<K, V>, BoxError> {
            let mut out = Vec::with_capacity(batch.len());
            for (key, existing) in batch {
                let Some(new_value) = pending.remove(&key) else {
                    out.push((key, existing));
                    continue;
                };
                if base.new_value_already_expired(&key, existing.as_ref(), &new_value) {
                    out.push((key, None));
                    continue;
                }
                if existing.is_some() {
                    updates += 1;
                } else {
                    puts += 1;
                }
                out.push((key, Some(new_value)));
            }
            Ok(out)
        };

        match base.store().bulk_compute(&keys, &mut remap) {
            Ok(_) => {
                base.add_bulk_method_entries_count(BulkOps::PutAll, puts);
                base.add_bulk_method_entries_count(BulkOps::UpdateAll, updates);
                base.record(PutAllOutcome::Success);
                Ok(())
            },
            Err(err) => {
                let decision =
                    store_part(err).and_then(|e| base.resilience().put_all_failure(&entries, e));
                base.record(PutAllOutcome::Failure);
                decision
            },
        }
    }

    /// Removes every key in one bulk store step.
    pub fn remove_all(&self, keys: &[K]) -> Result<(), CacheError> {
        let base = &self.base;
        base.check_available()?;
        let keys = dedup(keys.iter());

        let mut removed = 0u64;
        let mut remap = |batch: BatchMappings<K, V>| -> Result<BatchMappings<K, V>, BoxError> {
            Ok(batch
                .into_iter()
                .map(|(key, existing)| {
                    if existing.is_some() {
                        removed += 1;
                    }
                    (key, None)
                })
                .collect())
        };

        match base.store().bulk_compute(&keys, &mut remap) {
            Ok(_) => {
                base.add_bulk_method_entries_count(BulkOps::RemoveAll, removed);
                base.record(RemoveAllOutcome::Success);
                Ok(())
            },
            Err(err) => {
                let decision =
                    store_part(err).and_then(|e| base.resilience().remove_all_failure(&keys, e));
                base.record(RemoveAllOutcome::Failure);
                decision
            },
        }
    }

    /// Removes every entry one key at a time, recording a REMOVE outcome per
    /// key. Raw iteration steps that fail are skipped.
    pub fn remove_all_entries(&self) -> Result<(), CacheError> {
        self.base.check_available()?;
        let keys: Vec<K> = self
            .base
            .store()
            .iter()
            .filter_map(|step| match step {
                Ok((key, _)) => Some(key),
                Err(e) => {
                    warn!(error = %e, "skipping entry that failed during remove_all_entries");
                    None
                },
            })
            .collect();
        for key in &keys {
            self.remove_internal(key)?;
        }
        Ok(())
    }

    /// Only the requested keys that are present.
    pub fn get_all_present(&self, keys: &[K]) -> Result<HashMap<K, Arc<V>>, CacheError> {
        Ok(self
            .get_all_internal(keys, false)?
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    /// See [`loader::load_all`].
    pub fn load_all<F>(
        &self,
        keys: &[K],
        replace_existing: bool,
        loader: F,
    ) -> Result<HashMap<K, Option<Arc<V>>>, CacheError>
    where
        F: FnMut(&[K]) -> Result<HashMap<K, Arc<V>>, BoxError>,
    {
        loader::load_all(&self.base, keys, replace_existing, loader)
    }
}

fn dedup<'a, K: CacheKey>(keys: impl Iterator<Item = &'a K>) -> Vec<K> {
    let mut seen = FxHashSet::default();
    keys.filter(|key| seen.insert(*key))
        .cloned()
        .collect()
}

impl<K, V> CoreCache<K, V> for Cache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    fn base(&self) -> &CacheBase<K, V> {
        &self.base
    }

    fn remove_internal(&self, key: &K) -> Result<bool, CacheError> {
        let base = &self.base;
        base.check_available()?;
        match base.store().remove(key) {
            Ok(true) => {
                base.record(RemoveOutcome::Success);
                Ok(true)
            },
            Ok(false) => {
                base.record(RemoveOutcome::Noop);
                Ok(false)
            },
            Err(e) => {
                let decision = base.resilience().remove_failure(key, e);
                base.record(RemoveOutcome::Failure);
                decision.map(|()| false)
            },
        }
    }

    fn get_all_internal(
        &self,
        keys: &[K],
        include_absent: bool,
    ) -> Result<HashMap<K, Option<Arc<V>>>, CacheError> {
        let base = &self.base;
        base.check_available()?;
        let keys = dedup(keys.iter());

        let mut absent = |batch: &[K]| -> Result<BatchMappings<K, V>, BoxError> {
            Ok(batch.iter().map(|key| (key.clone(), None)).collect())
        };

        match base.store().bulk_compute_if_absent(&keys, &mut absent) {
            Ok(computed) => {
                let requested = computed.len() as u64;
                let mut result = HashMap::with_capacity(computed.len());
                for (key, holder) in computed {
                    match holder {
                        Some(holder) => {
                            result.insert(key, Some(holder.into_value()));
                        },
                        None if include_absent => {
                            result.insert(key, None);
                        },
                        None => {},
                    }
                }
                let hits = result.values().filter(|v| v.is_some()).count() as u64;
                base.add_bulk_method_entries_count(BulkOps::GetAllHits, hits);
                base.add_bulk_method_entries_count(BulkOps::GetAllMiss, requested - hits);
                base.record(GetAllOutcome::Success);
                Ok(result)
            },
            Err(err) => {
                let decision: Result<HashMap<K, Option<Arc<V>>>, CacheError> = store_part(err)
                    .and_then(|e| base.resilience().get_all_failure(&keys, e))
                    .map(|fallback| {
                        fallback
                            .into_iter()
                            .filter(|(_, value)| include_absent || value.is_some())
                            .collect()
                    });
                base.record(GetAllOutcome::Failure);
                decision
            },
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("base", &self.base).finish()
    }
}
