//! Memoization facade
//!
//! Wraps ordinary callables and stream producers so that calls go through
//! the cache:
//! - [`MemoizedFn`]: async or sync functions returning `Result<T, E>`
//! - [`MemoizedStream`]: functions returning a stream, replayed on later hits
//! - [`BoundMethod`]: a memoized function with its receiver already supplied
//!
//! Every wrapped callable gets a fresh [`CallableId`] and snapshots its
//! signature once, at wrap time.

use crate::args::CallArgs;
use crate::cache::{
    config::CacheConfig,
    entry::CachedValue,
    expiration::ExpirationPolicy,
    invalidation::InvalidationEvent,
    store::CacheStore,
    types::{CallableId, CallableStats, GroupName, Lookup},
};
use crate::error::{CacheError, Result};
use crate::fingerprint::{fingerprint as compute_fingerprint, Fingerprint, KeySpec};
use crate::replay::{ReplayBuffer, ReplayCursor};
use crate::signature::{Signature, SignatureResolver};
use crate::value::Value;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

type BoxedFn<T, E> = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync>;
type BoxedProducer<T> = Arc<dyn Fn(CallArgs) -> BoxStream<'static, T> + Send + Sync>;

/// Anything whose cache entries can be dropped as a unit
pub trait Memoized {
    /// Identity the entries are stored under
    fn id(&self) -> CallableId;

    /// Group the entries are stored in
    fn group(&self) -> &GroupName;
}

/// Entry point for wrapping callables over a shared [`CacheStore`]
#[derive(Clone)]
pub struct Memoizer {
    store: Arc<CacheStore>,
}

impl Memoizer {
    /// Memoizer over a fresh, private store
    pub fn new() -> Self {
        Self::with_store(CacheStore::shared())
    }

    /// Memoizer over an existing store
    pub fn with_store(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Wrap an async function
    pub fn wrap<T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        signature: &dyn SignatureResolver,
        config: CacheConfig,
        func: F,
    ) -> MemoizedFn<T, E>
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let func: BoxedFn<T, E> = Arc::new(move |args| func(args).boxed());
        MemoizedFn {
            inner: Arc::new(self.callable(name.into(), signature, config)),
            func,
        }
    }

    /// Wrap a synchronous function
    pub fn wrap_sync<T, E, F>(
        &self,
        name: impl Into<String>,
        signature: &dyn SignatureResolver,
        config: CacheConfig,
        func: F,
    ) -> MemoizedFn<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(CallArgs) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        self.wrap(name, signature, config, move |args| future::ready(func(args)))
    }

    /// Wrap a function producing a stream
    pub fn wrap_stream<T, F, S>(
        &self,
        name: impl Into<String>,
        signature: &dyn SignatureResolver,
        config: CacheConfig,
        producer: F,
    ) -> MemoizedStream<T>
    where
        F: Fn(CallArgs) -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let producer: BoxedProducer<T> = Arc::new(move |args| producer(args).boxed());
        MemoizedStream {
            inner: Arc::new(self.callable(name.into(), signature, config)),
            producer,
        }
    }

    /// Drop every entry stored under `group` (`None` is the default group)
    pub async fn invalidate_group(&self, group: Option<&str>) -> InvalidationEvent {
        self.store.delete_group(&group.map(str::to_string)).await
    }

    /// Drop every entry of one memoized callable
    pub async fn invalidate_callable(&self, memoized: &impl Memoized) -> InvalidationEvent {
        self.store
            .delete_callable(memoized.group(), memoized.id())
            .await
    }

    fn callable(&self, name: String, signature: &dyn SignatureResolver, config: CacheConfig) -> Callable {
        if let Err(reason) = config.validate() {
            warn!("Invalid cache configuration for {}: {}", name, reason);
        }

        let callable = Callable {
            id: CallableId::new(),
            group: config.group.clone(),
            key_spec: config.key_spec(),
            policy: ExpirationPolicy::from_timeout(config.timeout),
            signature: Signature::resolve(signature),
            store: Arc::clone(&self.store),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            name,
            config,
        };
        debug!("Memoizing {} as {}", callable.name, callable.id);
        callable
    }
}

impl Default for Memoizer {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every kind of wrapped callable
struct Callable {
    id: CallableId,
    name: String,
    group: GroupName,
    config: CacheConfig,
    key_spec: KeySpec,
    signature: Signature,
    policy: ExpirationPolicy,
    store: Arc<CacheStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Callable {
    fn fingerprint(&self, args: &CallArgs) -> Result<Fingerprint> {
        compute_fingerprint(&self.key_spec, args, &self.signature).map_err(|error| {
            warn!("Cannot fingerprint call to {}: {}", self.name, error);
            error
        })
    }

    fn record(&self, lookup: Lookup) {
        let counter = if lookup.is_hit() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self) -> CallableStats {
        CallableStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn invalidate(&self, args: &CallArgs) -> Result<bool> {
        let fingerprint = self.fingerprint(args)?;
        let event = self.store.invalidate(&self.group, self.id, &fingerprint).await;
        Ok(!event.is_noop())
    }

    async fn clear(&self) -> InvalidationEvent {
        self.store.delete_callable(&self.group, self.id).await
    }

    async fn cached_len(&self) -> usize {
        self.store.callable_len(&self.group, self.id).await
    }
}

/// A memoized function
///
/// Cloning is cheap; clones share identity, counters and cache entries.
pub struct MemoizedFn<T, E> {
    inner: Arc<Callable>,
    func: BoxedFn<T, E>,
}

impl<T, E> MemoizedFn<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: From<CacheError> + Send + 'static,
{
    /// Call through the cache.
    ///
    /// Returns the stored result when a valid entry exists for the call's
    /// fingerprint, otherwise runs the function and stores an `Ok` result.
    /// Errors from the function are returned unchanged and never stored.
    pub async fn call(&self, args: CallArgs) -> std::result::Result<T, E> {
        let inner = &self.inner;
        let fingerprint = inner.fingerprint(&args)?;

        let (entry, lookup) = inner
            .store
            .get_or_compute(&inner.group, inner.id, &fingerprint, &inner.policy, || async {
                let value = (self.func)(args.clone()).await?;
                Ok::<CachedValue, E>(Arc::new(value))
            })
            .await?;
        inner.record(lookup);

        match entry.value_ref::<T>() {
            Some(value) => Ok(value.clone()),
            None => {
                warn!(
                    "Cached value for {} [{}] has an unexpected type, calling directly",
                    inner.name, fingerprint
                );
                (self.func)(args).await
            }
        }
    }
}

impl<T, E> MemoizedFn<T, E> {
    /// Fingerprint a call would be stored under
    pub fn fingerprint(&self, args: &CallArgs) -> Result<Fingerprint> {
        self.inner.fingerprint(args)
    }

    /// Drop the entry for one call; `Ok(true)` if a value was stored
    pub async fn invalidate(&self, args: &CallArgs) -> Result<bool> {
        self.inner.invalidate(args).await
    }

    /// Drop every entry of this function
    pub async fn clear(&self) -> InvalidationEvent {
        self.inner.clear().await
    }

    /// Number of results currently stored for this function
    pub async fn cached_len(&self) -> usize {
        self.inner.cached_len().await
    }

    pub fn stats(&self) -> CallableStats {
        self.inner.stats()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Attach a receiver; it is passed as positional argument 0 of every call
    pub fn bind(&self, receiver: impl Into<Value>) -> BoundMethod<T, E> {
        BoundMethod {
            method: self.clone(),
            receiver: receiver.into(),
        }
    }
}

impl<T, E> Memoized for MemoizedFn<T, E> {
    fn id(&self) -> CallableId {
        self.inner.id
    }

    fn group(&self) -> &GroupName {
        &self.inner.group
    }
}

impl<T, E> Clone for MemoizedFn<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T, E> fmt::Debug for MemoizedFn<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedFn")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("group", &self.inner.group)
            .finish_non_exhaustive()
    }
}

/// A memoized method with its receiver
///
/// The receiver takes part in fingerprinting like any other positional
/// argument. A method with no other arguments, keyed on position 0, behaves
/// like a cached property of the receiver; call [`BoundMethod::invalidate`]
/// after mutating the receiver to force a recompute.
pub struct BoundMethod<T, E> {
    method: MemoizedFn<T, E>,
    receiver: Value,
}

impl<T, E> BoundMethod<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: From<CacheError> + Send + 'static,
{
    pub async fn call(&self, args: CallArgs) -> std::result::Result<T, E> {
        self.method.call(self.with_receiver(args)).await
    }
}

impl<T, E> BoundMethod<T, E> {
    /// Drop the entry for one call on this receiver
    pub async fn invalidate(&self, args: CallArgs) -> Result<bool> {
        self.method.invalidate(&self.with_receiver(args)).await
    }

    pub fn fingerprint(&self, args: CallArgs) -> Result<Fingerprint> {
        self.method.fingerprint(&self.with_receiver(args))
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn method(&self) -> &MemoizedFn<T, E> {
        &self.method
    }

    fn with_receiver(&self, args: CallArgs) -> CallArgs {
        args.prepend(self.receiver.clone())
    }
}

impl<T, E> Memoized for BoundMethod<T, E> {
    fn id(&self) -> CallableId {
        self.method.id()
    }

    fn group(&self) -> &GroupName {
        self.method.group()
    }
}

impl<T, E> Clone for BoundMethod<T, E> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

/// A memoized stream producer
///
/// The producer runs once per refresh; every call, hit or miss, gets its own
/// [`ReplayCursor`] over the recorded items.
pub struct MemoizedStream<T> {
    inner: Arc<Callable>,
    producer: BoxedProducer<T>,
}

impl<T> MemoizedStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub async fn call(&self, args: CallArgs) -> Result<ReplayCursor<T>> {
        let inner = &self.inner;
        let fingerprint = inner.fingerprint(&args)?;
        let precalculate = inner.config.precalculate;

        let (entry, lookup) = inner
            .store
            .get_or_compute(&inner.group, inner.id, &fingerprint, &inner.policy, || async {
                let source = (self.producer)(args.clone());
                let buffer = if precalculate {
                    ReplayBuffer::precalculate(source).await
                } else {
                    ReplayBuffer::new(source)
                };
                Ok::<CachedValue, CacheError>(Arc::new(buffer))
            })
            .await?;
        inner.record(lookup);

        match entry.value_arc::<ReplayBuffer<T>>() {
            Some(buffer) => Ok(buffer.cursor()),
            None => {
                warn!(
                    "Cached value for {} [{}] is not a replay buffer, streaming directly",
                    inner.name, fingerprint
                );
                Ok(Arc::new(ReplayBuffer::new((self.producer)(args))).cursor())
            }
        }
    }
}

impl<T> MemoizedStream<T> {
    pub fn fingerprint(&self, args: &CallArgs) -> Result<Fingerprint> {
        self.inner.fingerprint(args)
    }

    pub async fn invalidate(&self, args: &CallArgs) -> Result<bool> {
        self.inner.invalidate(args).await
    }

    pub async fn clear(&self) -> InvalidationEvent {
        self.inner.clear().await
    }

    pub async fn cached_len(&self) -> usize {
        self.inner.cached_len().await
    }

    pub fn stats(&self) -> CallableStats {
        self.inner.stats()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}

impl<T> Memoized for MemoizedStream<T> {
    fn id(&self) -> CallableId {
        self.inner.id
    }

    fn group(&self) -> &GroupName {
        &self.inner.group
    }
}

impl<T> Clone for MemoizedStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for MemoizedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedStream")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("group", &self.inner.group)
            .finish_non_exhaustive()
    }
}
