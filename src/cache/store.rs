//! Main cache store implementation
//!
//! Layout: group name -> callable identity -> fingerprint -> slot.
//!
//! The group map sits behind a single `RwLock`, so group and callable
//! deletion are atomic for every reader. Each slot has its own async mutex:
//! a caller that finds a slot empty or expired keeps the slot locked while
//! the wrapped callable runs, and concurrent callers for the same
//! fingerprint wait for that result instead of computing it again.
//!
//! A slot removed from the map is marked detached. Callers that were queued
//! on it look the fingerprint up again; a computation already running when
//! the slot was removed finishes into the detached slot, invisible to later
//! lookups. Entry counts read per-slot flags and never wait on a slot lock.

use crate::cache::{
    entry::{CacheEntry, CachedValue},
    expiration::ExpirationPolicy,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::{group_label, CacheStats, CallableId, GroupName, Lookup},
};
use crate::fingerprint::Fingerprint;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

type Slot = Arc<SlotState>;
type CallableEntries = HashMap<Fingerprint, Slot>;
type Group = HashMap<CallableId, CallableEntries>;

#[derive(Default)]
struct SlotState {
    entry: Arc<Mutex<Option<CacheEntry>>>,
    /// Set once an entry has been stored; entries are only ever replaced
    filled: AtomicBool,
    /// Set when the slot is dropped from the map
    detached: AtomicBool,
}

impl SlotState {
    fn is_filled(&self) -> bool {
        self.filled.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

/// Process-memory store for memoized results
///
/// Create one per scope that needs isolated caching and share it via `Arc`.
#[derive(Default)]
pub struct CacheStore {
    groups: RwLock<HashMap<GroupName, Group>>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn record(&self, lookup: Lookup) {
        let counter = match lookup {
            Lookup::Hit => &self.hits,
            Lookup::Miss => &self.misses,
            Lookup::Expired => &self.expirations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn invalidated(&self, removed: usize) {
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
    }
}

impl CacheStore {
    pub fn new() -> Self {
        info!("Initializing memoization cache store");
        Self::default()
    }

    /// Create a store ready to be shared between memoized callables
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Read a valid entry.
    ///
    /// An expired entry is reported as a miss but stays in place until the
    /// next `put` or refresh overwrites it.
    pub async fn get(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
        policy: &ExpirationPolicy,
    ) -> Option<CacheEntry> {
        let Some(slot) = self.existing_slot(group, callable, fingerprint).await else {
            self.counters.record(Lookup::Miss);
            debug!("Cache miss: {} [{}]", callable, fingerprint);
            return None;
        };

        let guard = slot.entry.lock().await;
        let (lookup, entry) = match guard.as_ref() {
            None => (Lookup::Miss, None),
            Some(entry) if policy.is_entry_expired(entry) => (Lookup::Expired, None),
            Some(entry) => (Lookup::Hit, Some(entry.clone())),
        };
        self.counters.record(lookup);
        debug!("Cache {}: {} [{}]", lookup, callable, fingerprint);
        entry
    }

    /// Store an entry, replacing whatever the slot held
    pub async fn put(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: Fingerprint,
        entry: CacheEntry,
    ) {
        let (slot, mut guard) = self.lock_slot(group, callable, &fingerprint).await;
        *guard = Some(entry);
        slot.filled.store(true, Ordering::Release);
        debug!("Stored cache entry: {} [{}]", callable, fingerprint);
    }

    /// Return the valid entry for a fingerprint, running `compute` to
    /// produce it when the slot is empty or expired.
    ///
    /// The lookup and the refresh happen under the slot lock, so `compute`
    /// runs at most once per refresh no matter how many callers race. An
    /// error from `compute` is returned as-is; an empty slot is dropped
    /// again so nothing is left behind for the failed fingerprint.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
        policy: &ExpirationPolicy,
        compute: F,
    ) -> Result<(CacheEntry, Lookup), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue, E>>,
    {
        let (slot, mut guard) = self.lock_slot(group, callable, fingerprint).await;

        let lookup = match guard.as_ref() {
            Some(entry) if !policy.is_entry_expired(entry) => {
                self.counters.record(Lookup::Hit);
                debug!("Cache hit: {} [{}]", callable, fingerprint);
                return Ok((entry.clone(), Lookup::Hit));
            }
            Some(_) => Lookup::Expired,
            None => Lookup::Miss,
        };
        self.counters.record(lookup);
        debug!(
            "Cache {}: {} [{}], computing",
            lookup, callable, fingerprint
        );

        let value = match compute().await {
            Ok(value) => value,
            Err(error) => {
                if guard.is_none() {
                    self.remove_slot(group, callable, fingerprint, &slot).await;
                }
                return Err(error);
            }
        };
        let entry = CacheEntry::refresh(guard.as_ref(), value);
        *guard = Some(entry.clone());
        slot.filled.store(true, Ordering::Release);

        Ok((entry, lookup))
    }

    /// Drop every entry of every callable in a group
    pub async fn delete_group(&self, group: &GroupName) -> InvalidationEvent {
        let dropped = {
            let mut groups = self.groups.write().await;
            groups.get_mut(group).map(std::mem::take).unwrap_or_default()
        };
        let removed = detach_all(dropped.values().flat_map(HashMap::values));

        self.counters.invalidated(removed);
        info!(
            "Invalidated {} entries in group: {}",
            removed,
            group_label(group)
        );

        InvalidationEvent::new(InvalidationReason::Group, group.clone(), removed)
    }

    /// Drop all entries of one callable within a group
    pub async fn delete_callable(&self, group: &GroupName, callable: CallableId) -> InvalidationEvent {
        let dropped = {
            let mut groups = self.groups.write().await;
            groups
                .get_mut(group)
                .and_then(|callables| callables.remove(&callable))
                .unwrap_or_default()
        };
        let removed = detach_all(dropped.values());

        self.counters.invalidated(removed);
        info!(
            "Invalidated {} entries of callable {} in group: {}",
            removed,
            callable,
            group_label(group)
        );

        InvalidationEvent::new(
            InvalidationReason::Callable { callable },
            group.clone(),
            removed,
        )
    }

    /// Drop a single entry
    pub async fn invalidate(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
    ) -> InvalidationEvent {
        let dropped = {
            let mut groups = self.groups.write().await;
            groups
                .get_mut(group)
                .and_then(|callables| callables.get_mut(&callable))
                .and_then(|entries| entries.remove(fingerprint))
        };
        let removed = detach_all(dropped.iter());

        if removed > 0 {
            self.counters.invalidated(removed);
            debug!("Invalidated cache entry: {} [{}]", callable, fingerprint);
        }

        InvalidationEvent::new(
            InvalidationReason::Fingerprint {
                callable,
                fingerprint: fingerprint.clone(),
            },
            group.clone(),
            removed,
        )
    }

    /// Clear all entries from the store
    pub async fn clear(&self) -> InvalidationEvent {
        let dropped = std::mem::take(&mut *self.groups.write().await);
        let removed = detach_all(
            dropped
                .values()
                .flat_map(HashMap::values)
                .flat_map(HashMap::values),
        );

        self.counters.invalidated(removed);
        info!("Cleared {} entries from cache store", removed);

        InvalidationEvent::new(InvalidationReason::Clear, None, removed)
    }

    /// Get number of stored entries
    pub async fn len(&self) -> usize {
        let groups = self.groups.read().await;
        groups
            .values()
            .flat_map(HashMap::values)
            .flat_map(HashMap::values)
            .filter(|slot| slot.is_filled())
            .count()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of stored entries for one callable
    pub async fn callable_len(&self, group: &GroupName, callable: CallableId) -> usize {
        let groups = self.groups.read().await;
        groups
            .get(group)
            .and_then(|callables| callables.get(&callable))
            .map_or(0, |entries| {
                entries.values().filter(|slot| slot.is_filled()).count()
            })
    }

    /// Names of all groups the store has seen
    pub async fn group_names(&self) -> Vec<GroupName> {
        self.groups.read().await.keys().cloned().collect()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let groups = self.groups.read().await.len();
        let entries = self.len().await;

        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries,
            groups,
        }
    }

    /// Internal: look up a slot without creating it
    async fn existing_slot(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
    ) -> Option<Slot> {
        let groups = self.groups.read().await;
        groups
            .get(group)
            .and_then(|callables| callables.get(&callable))
            .and_then(|entries| entries.get(fingerprint))
            .cloned()
    }

    /// Internal: look up a slot, creating the group, callable and slot on demand
    async fn slot(&self, group: &GroupName, callable: CallableId, fingerprint: &Fingerprint) -> Slot {
        if let Some(slot) = self.existing_slot(group, callable, fingerprint).await {
            return slot;
        }

        let mut groups = self.groups.write().await;
        if !groups.contains_key(group) {
            debug!("Creating cache group: {}", group_label(group));
        }
        let slot = groups
            .entry(group.clone())
            .or_default()
            .entry(callable)
            .or_default()
            .entry(fingerprint.clone())
            .or_default();
        Arc::clone(slot)
    }

    /// Internal: lock the slot currently in the map for a fingerprint,
    /// retrying if it was detached while waiting
    async fn lock_slot(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
    ) -> (Slot, OwnedMutexGuard<Option<CacheEntry>>) {
        loop {
            let slot = self.slot(group, callable, fingerprint).await;
            let guard = Arc::clone(&slot.entry).lock_owned().await;
            if !slot.detached.load(Ordering::Acquire) {
                return (slot, guard);
            }
        }
    }

    /// Internal: drop `slot` from the map if it is still the one stored there
    async fn remove_slot(
        &self,
        group: &GroupName,
        callable: CallableId,
        fingerprint: &Fingerprint,
        slot: &Slot,
    ) {
        let mut groups = self.groups.write().await;
        let Some(entries) = groups
            .get_mut(group)
            .and_then(|callables| callables.get_mut(&callable))
        else {
            return;
        };
        if entries
            .get(fingerprint)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            entries.remove(fingerprint);
            slot.detach();
        }
    }
}

/// Detach dropped slots and count the ones that held an entry
fn detach_all<'a>(slots: impl Iterator<Item = &'a Slot>) -> usize {
    slots
        .map(|slot| {
            slot.detach();
            slot.is_filled()
        })
        .filter(|&filled| filled)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn fp(hashes: &[u64]) -> Fingerprint {
        Fingerprint::from(hashes.to_vec())
    }

    fn group(name: &str) -> GroupName {
        Some(name.to_string())
    }

    #[tokio::test]
    async fn test_basic_put_and_get() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::never();

        store
            .put(&None, callable, fp(&[1]), CacheEntry::from_value("value1".to_string()))
            .await;

        let entry = store.get(&None, callable, &fp(&[1]), &policy).await.unwrap();
        assert_eq!(entry.value_ref::<String>().unwrap(), "value1");

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.groups, 1);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let store = CacheStore::new();
        let policy = ExpirationPolicy::never();

        assert!(store.get(&None, CallableId::new(), &fp(&[]), &policy).await.is_none());

        let stats = store.stats().await;
        assert_eq!(stats.misses, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiration() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::after(Duration::from_millis(100));

        store
            .put(&None, callable, fp(&[7]), CacheEntry::from_value(7i64))
            .await;

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(store.get(&None, callable, &fp(&[7]), &policy).await.is_some());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(store.get(&None, callable, &fp(&[7]), &policy).await.is_none());

        // still physically present until overwritten
        assert_eq!(store.len().await, 1);
        let stats = store.stats().await;
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::never();
        let runs = AtomicUsize::new(0);

        for _ in 0..3 {
            let (entry, _) = store
                .get_or_compute(&None, callable, &fp(&[1]), &policy, || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<CachedValue, String>(Arc::new(10u32))
                })
                .await
                .unwrap();
            assert_eq!(entry.value_ref::<u32>(), Some(&10));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let stats = store.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_compute_refreshes_expired() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::after(Duration::from_secs(1));

        let (first, lookup) = store
            .get_or_compute(&None, callable, &fp(&[]), &policy, || async {
                Ok::<CachedValue, String>(Arc::new(1u8))
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(first.metadata.version, 1);

        tokio::time::advance(Duration::from_secs(2)).await;

        let (second, lookup) = store
            .get_or_compute(&None, callable, &fp(&[]), &policy, || async {
                Ok::<CachedValue, String>(Arc::new(2u8))
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Expired);
        assert_eq!(second.value_ref::<u8>(), Some(&2));
        assert_eq!(second.metadata.version, 2);
    }

    #[tokio::test]
    async fn test_get_or_compute_does_not_store_errors() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::never();

        let result = store
            .get_or_compute(&None, callable, &fp(&[1]), &policy, || async {
                Err::<CachedValue, String>("boom".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(store.len().await, 0);

        let (_, lookup) = store
            .get_or_compute(&None, callable, &fp(&[1]), &policy, || async {
                Ok::<CachedValue, String>(Arc::new(()))
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_group() {
        let store = CacheStore::new();
        let a = CallableId::new();
        let b = CallableId::new();

        store.put(&group("g"), a, fp(&[1]), CacheEntry::from_value(1)).await;
        store.put(&group("g"), b, fp(&[2]), CacheEntry::from_value(2)).await;
        store.put(&group("h"), a, fp(&[1]), CacheEntry::from_value(3)).await;

        let event = store.delete_group(&group("g")).await;
        assert_eq!(event.removed, 2);
        assert_eq!(event.reason, InvalidationReason::Group);

        let policy = ExpirationPolicy::never();
        assert!(store.get(&group("g"), a, &fp(&[1]), &policy).await.is_none());
        assert!(store.get(&group("g"), b, &fp(&[2]), &policy).await.is_none());
        assert!(store.get(&group("h"), a, &fp(&[1]), &policy).await.is_some());

        assert_eq!(store.stats().await.invalidations, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_group_is_noop() {
        let store = CacheStore::new();
        let event = store.delete_group(&group("nothing")).await;
        assert!(event.is_noop());

        let event = store.delete_callable(&None, CallableId::new()).await;
        assert!(event.is_noop());
        assert!(store.invalidate(&None, CallableId::new(), &fp(&[1])).await.is_noop());
    }

    #[tokio::test]
    async fn test_delete_callable() {
        let store = CacheStore::new();
        let a = CallableId::new();
        let b = CallableId::new();

        store.put(&None, a, fp(&[1]), CacheEntry::from_value(1)).await;
        store.put(&None, a, fp(&[2]), CacheEntry::from_value(2)).await;
        store.put(&None, b, fp(&[1]), CacheEntry::from_value(3)).await;

        let event = store.delete_callable(&None, a).await;
        assert_eq!(event.removed, 2);
        assert_eq!(store.callable_len(&None, a).await, 0);
        assert_eq!(store.callable_len(&None, b).await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_single_fingerprint() {
        let store = CacheStore::new();
        let callable = CallableId::new();

        store.put(&None, callable, fp(&[1]), CacheEntry::from_value(1)).await;
        store.put(&None, callable, fp(&[2]), CacheEntry::from_value(2)).await;

        let event = store.invalidate(&None, callable, &fp(&[1])).await;
        assert_eq!(event.removed, 1);
        assert_eq!(
            event.reason,
            InvalidationReason::Fingerprint {
                callable,
                fingerprint: fp(&[1]),
            }
        );
        assert!(store.invalidate(&None, callable, &fp(&[1])).await.is_noop());
        assert_eq!(store.callable_len(&None, callable).await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = CacheStore::new();
        store.put(&None, CallableId::new(), fp(&[1]), CacheEntry::from_value(1)).await;
        store.put(&group("x"), CallableId::new(), fp(&[1]), CacheEntry::from_value(2)).await;

        let event = store.clear().await;
        assert_eq!(event.removed, 2);
        assert!(store.is_empty().await);
        assert!(store.group_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::never();

        store.put(&None, callable, fp(&[1]), CacheEntry::from_value("old")).await;
        store.put(&None, callable, fp(&[1]), CacheEntry::from_value("new")).await;

        let entry = store.get(&None, callable, &fp(&[1]), &policy).await.unwrap();
        assert_eq!(entry.value_ref::<&str>(), Some(&"new"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_computations_leave_nothing_behind() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        let policy = ExpirationPolicy::never();

        for key in 0..5 {
            let result = store
                .get_or_compute(&None, callable, &fp(&[key]), &policy, || async {
                    Err::<CachedValue, String>("unavailable".to_string())
                })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(store.callable_len(&None, callable).await, 0);
        let event = store.delete_callable(&None, callable).await;
        assert_eq!(event.removed, 0);
        assert_eq!(store.stats().await.invalidations, 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_slot() {
        let store = CacheStore::new();
        let callable = CallableId::new();
        // zero timeout: every read after the first instant is stale
        let policy = ExpirationPolicy::after(Duration::ZERO);

        store.put(&None, callable, fp(&[1]), CacheEntry::from_value(1u8)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result = store
            .get_or_compute(&None, callable, &fp(&[1]), &policy, || async {
                Err::<CachedValue, String>("boom".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_waiters_retry_after_failed_computation() {
        let store = Arc::new(CacheStore::new());
        let callable = CallableId::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let failing = {
            let store = store.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                store
                    .get_or_compute(&None, callable, &fp(&[1]), &ExpirationPolicy::never(), || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<CachedValue, String>("boom".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (entry, lookup) = store
            .get_or_compute(&None, callable, &fp(&[1]), &ExpirationPolicy::never(), || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<CachedValue, String>(Arc::new(7u8))
            })
            .await
            .unwrap();

        assert!(failing.await.unwrap().is_err());
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(entry.value_ref::<u8>(), Some(&7));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_counting_does_not_wait_for_running_computation() {
        let store = Arc::new(CacheStore::new());
        let callable = CallableId::new();
        store.put(&None, callable, fp(&[1]), CacheEntry::from_value(1u8)).await;

        let slow = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .get_or_compute(&None, callable, &fp(&[2]), &ExpirationPolicy::never(), || async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok::<CachedValue, String>(Arc::new(2u8))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = tokio::time::timeout(Duration::from_millis(500), store.stats())
            .await
            .expect("stats must not wait on the running computation");
        assert_eq!(stats.entries, 1);
        assert_eq!(
            tokio::time::timeout(Duration::from_millis(500), store.callable_len(&None, callable))
                .await
                .unwrap(),
            1
        );
        slow.abort();
    }

    #[tokio::test]
    async fn test_computation_can_read_store_size() {
        let store = Arc::new(CacheStore::new());
        let callable = CallableId::new();

        let inner = store.clone();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            store.get_or_compute(&None, callable, &fp(&[1]), &ExpirationPolicy::never(), || async move {
                let size = inner.len().await;
                Ok::<CachedValue, String>(Arc::new(size))
            }),
        )
        .await
        .expect("computation reading the store must complete")
        .unwrap();

        assert_eq!(result.0.value_ref::<usize>(), Some(&0));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_group_during_computation() {
        let store = Arc::new(CacheStore::new());
        let callable = CallableId::new();
        let reports = group("reports");
        let runs = Arc::new(AtomicUsize::new(0));

        let in_flight = {
            let store = store.clone();
            let reports = reports.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                store
                    .get_or_compute(&reports, callable, &fp(&[1]), &ExpirationPolicy::never(), || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<CachedValue, String>(Arc::new("stale"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // the slot is still empty, so nothing is reported as removed
        let event = store.delete_group(&reports).await;
        assert_eq!(event.removed, 0);

        let (entry, _) = in_flight.await.unwrap().unwrap();
        assert_eq!(entry.value_ref::<&str>(), Some(&"stale"));
        // the result landed in the detached slot
        assert_eq!(store.len().await, 0);

        let (entry, lookup) = store
            .get_or_compute(&reports, callable, &fp(&[1]), &ExpirationPolicy::never(), || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<CachedValue, String>(Arc::new("fresh"))
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(entry.value_ref::<&str>(), Some(&"fresh"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_waiters_on_deleted_group_recompute() {
        let store = Arc::new(CacheStore::new());
        let callable = CallableId::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let spawn_call = |value: u8| {
            let store = store.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                store
                    .get_or_compute(&group("g"), callable, &fp(&[1]), &ExpirationPolicy::never(), || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<CachedValue, String>(Arc::new(value))
                    })
                    .await
            })
        };

        let first = spawn_call(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let waiter = spawn_call(2);
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.delete_group(&group("g")).await;

        first.await.unwrap().unwrap();
        let (entry, _) = waiter.await.unwrap().unwrap();
        // the waiter did not read the result of the detached slot
        assert_eq!(entry.value_ref::<u8>(), Some(&2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 1);
    }
}
