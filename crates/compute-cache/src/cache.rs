//! The compute cache: LRU entries, shared in-flight computations and
//! per-consumer cancellation slots behind one lock.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::consumer::ConsumerHandle;
use crate::error::{CacheError, Result};
use crate::fingerprint::{Fingerprint, Fingerprintable};
use crate::stats::{CacheStats, Counters};

/// Future returned to every caller of the cache.
pub type ComputeFuture<V> = BoxFuture<'static, Result<V>>;

type ComputeFn<R, V> = dyn Fn(R, CancellationToken) -> ComputeFuture<V> + Send + Sync;
type SharedComputation<V> = Shared<ComputeFuture<V>>;

pub(crate) type ConsumerId = u64;

/// An in-flight computation shared by every waiter on its key.
struct Pending<V> {
    id: u64,
    computation: SharedComputation<V>,
    /// Token handed to the compute function.
    token: CancellationToken,
    waiters: HashSet<ConsumerId>,
}

/// A consumer's registration on one in-flight computation.
struct Slot {
    key: Fingerprint,
    computation_id: u64,
    /// Resolves only this consumer's wait.
    token: CancellationToken,
}

struct CacheState<V> {
    entries: LruCache<Fingerprint, V>,
    capacity: usize,
    pending: HashMap<Fingerprint, Pending<V>>,
    slots: HashMap<ConsumerId, Slot>,
    next_computation: u64,
}

impl<V: Clone> CacheState<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            pending: HashMap::new(),
            slots: HashMap::new(),
            next_computation: 0,
        }
    }

    fn insert_entry(&mut self, key: Fingerprint, value: V, counters: &Counters) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains(&key) {
            while self.entries.len() >= self.capacity {
                if self.entries.pop_lru().is_none() {
                    break;
                }
                Counters::bump(&counters.evictions);
            }
        }
        self.entries.put(key, value);
    }

    fn shrink_to(&mut self, capacity: usize, counters: &Counters) {
        self.capacity = capacity;
        while self.entries.len() > capacity {
            if self.entries.pop_lru().is_none() {
                break;
            }
            Counters::bump(&counters.evictions);
        }
    }

    /// Remove the consumer's registration if it points at a different key.
    fn take_other_slot(&mut self, consumer: ConsumerId, next_key: &Fingerprint) -> Option<Slot> {
        match self.slots.get(&consumer) {
            Some(slot) if slot.key != *next_key => self.slots.remove(&consumer),
            _ => None,
        }
    }

    /// Cancel the consumer's registration on another key before it starts a
    /// fresh computation.
    fn supersede(&mut self, consumer: ConsumerId, next_key: &Fingerprint) -> Option<Fingerprint> {
        let slot = self.take_other_slot(consumer, next_key)?;
        self.release_slot(consumer, slot)
    }

    /// Move the consumer's registration to a computation it is joining. The
    /// earlier wait keeps running and its computation is left alone.
    fn reassign(&mut self, consumer: ConsumerId, next_key: &Fingerprint) {
        let Some(slot) = self.take_other_slot(consumer, next_key) else {
            return;
        };
        if let Some(pending) = self.pending.get_mut(&slot.key) {
            if pending.id == slot.computation_id {
                pending.waiters.remove(&consumer);
            }
        }
    }

    /// Resolve the consumer's own wait and cancel the computation when no
    /// other consumer still waits on it. Returns the abandoned key.
    fn release_slot(&mut self, consumer: ConsumerId, slot: Slot) -> Option<Fingerprint> {
        slot.token.cancel();

        let pending = self.pending.get_mut(&slot.key)?;
        if pending.id != slot.computation_id {
            return None;
        }
        pending.waiters.remove(&consumer);
        if !pending.waiters.is_empty() {
            return None;
        }

        pending.token.cancel();
        // Detach so the next request for this key starts fresh.
        self.pending.remove(&slot.key);
        Some(slot.key)
    }

    fn register_slot(&mut self, consumer: ConsumerId, key: &Fingerprint, computation_id: u64) -> CancellationToken {
        match self.slots.get(&consumer) {
            Some(slot) if slot.key == *key && slot.computation_id == computation_id => slot.token.clone(),
            _ => {
                let token = CancellationToken::new();
                self.slots.insert(
                    consumer,
                    Slot {
                        key: key.clone(),
                        computation_id,
                        token: token.clone(),
                    },
                );
                token
            }
        }
    }
}

pub(crate) struct CacheInner<R, V> {
    name: String,
    compute: Box<ComputeFn<R, V>>,
    state: Mutex<CacheState<V>>,
    next_consumer: AtomicU64,
    counters: Counters,
}

impl<R, V: Clone> CacheInner<R, V> {
    fn lock_state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, key: &Fingerprint, computation_id: u64, result: &Result<V>) {
        let mut state = self.lock_state();

        if state.pending.get(key).is_some_and(|p| p.id == computation_id) {
            state.pending.remove(key);
        }
        state
            .slots
            .retain(|_, slot| !(slot.key == *key && slot.computation_id == computation_id));

        match result {
            Ok(value) => {
                state.insert_entry(key.clone(), value.clone(), &self.counters);
                debug!(cache = %self.name, key = %key, entries = state.entries.len(), "cached computed value");
            }
            Err(err) if err.is_cancelled() => {
                Counters::bump(&self.counters.cancellations);
                debug!(cache = %self.name, key = %key, "computation cancelled");
            }
            Err(err) => {
                Counters::bump(&self.counters.failures);
                warn!(cache = %self.name, key = %key, error = %err, "computation failed");
            }
        }
    }

    pub(crate) fn release(&self, consumer: ConsumerId) {
        let mut state = self.lock_state();
        if let Some(slot) = state.slots.remove(&consumer) {
            if let Some(key) = state.release_slot(consumer, slot) {
                debug!(cache = %self.name, key = %key, consumer, "abandoned in-flight computation");
            }
        }
    }

    pub(crate) fn has_pending_slot(&self, consumer: ConsumerId) -> bool {
        let state = self.lock_state();
        state.slots.get(&consumer).is_some_and(|slot| {
            state
                .pending
                .get(&slot.key)
                .is_some_and(|p| p.id == slot.computation_id)
        })
    }
}

/// Memoizes an asynchronous compute function by request fingerprint.
///
/// Cloning the cache is cheap and shares all state. Fresh computations are
/// spawned onto the ambient tokio runtime, so `get` must be called from
/// within one.
pub struct ComputeCache<R, V> {
    pub(crate) inner: Arc<CacheInner<R, V>>,
}

impl<R, V> Clone for ComputeCache<R, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, V> std::fmt::Debug for ComputeCache<R, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeCache").field("name", &self.inner.name).finish_non_exhaustive()
    }
}

impl<R, V> ComputeCache<R, V>
where
    R: Fingerprintable + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache around a compute function.
    ///
    /// The compute function receives the request and a cancellation token it
    /// must poll at its own suspension points.
    pub fn new<F, Fut>(config: CacheConfig, compute: F) -> Self
    where
        F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        Self {
            inner: Arc::new(CacheInner {
                name: config.name,
                compute: Box::new(move |request, token| compute(request, token).boxed()),
                state: Mutex::new(CacheState::new(config.capacity)),
                next_consumer: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Shorthand for [`ComputeCache::new`] with a named capacity.
    pub fn with_capacity<F, Fut>(name: impl Into<String>, capacity: usize, compute: F) -> Self
    where
        F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        Self::new(CacheConfig::new(name, capacity), compute)
    }

    /// Register a new consumer identity.
    pub fn consumer(&self) -> ConsumerHandle<R, V> {
        let id = self.inner.next_consumer.fetch_add(1, Ordering::Relaxed);
        ConsumerHandle::new(self.clone(), id)
    }

    /// Resolve a request on behalf of `consumer`.
    ///
    /// Bookkeeping (hit, join or spawn) happens before this returns; the
    /// returned future only waits for the outcome.
    pub fn get(&self, request: R, consumer: &ConsumerHandle<R, V>) -> ComputeFuture<V> {
        if !Arc::ptr_eq(&self.inner, &consumer.cache().inner) {
            return future::ready(Err(CacheError::ForeignConsumer(consumer.id()))).boxed();
        }
        self.resolve(request, consumer.id())
    }

    pub(crate) fn resolve(&self, request: R, consumer: ConsumerId) -> ComputeFuture<V> {
        let key = match request.fingerprint() {
            Ok(key) => key,
            Err(err) => return future::ready(Err(err.into())).boxed(),
        };

        let inner = &self.inner;
        let mut state = inner.lock_state();

        // A hit leaves the consumer's slot untouched.
        if let Some(value) = state.entries.get(&key) {
            let value = value.clone();
            Counters::bump(&inner.counters.hits);
            debug!(cache = %inner.name, key = %key, "returning cached value");
            return future::ready(Ok(value)).boxed();
        }

        if let Some((computation, computation_id)) = state
            .pending
            .get(&key)
            .map(|pending| (pending.computation.clone(), pending.id))
        {
            state.reassign(consumer, &key);
            if let Some(pending) = state.pending.get_mut(&key) {
                pending.waiters.insert(consumer);
            }
            let token = state.register_slot(consumer, &key, computation_id);
            Counters::bump(&inner.counters.joins);
            debug!(cache = %inner.name, key = %key, "awaiting existing computation");
            return wait(computation, token);
        }

        if let Some(abandoned) = state.supersede(consumer, &key) {
            debug!(cache = %inner.name, key = %abandoned, consumer, "superseded in-flight computation");
        }

        Counters::bump(&inner.counters.misses);
        debug!(cache = %inner.name, key = %key, "computing value");

        state.next_computation += 1;
        let computation_id = state.next_computation;
        let token = CancellationToken::new();
        let computation = spawn_computation(
            Arc::downgrade(&self.inner),
            key.clone(),
            computation_id,
            (inner.compute)(request, token.clone()),
        );

        state.pending.insert(
            key.clone(),
            Pending {
                id: computation_id,
                computation: computation.clone(),
                token,
                waiters: HashSet::from([consumer]),
            },
        );
        let wait_token = state.register_slot(consumer, &key, computation_id);
        wait(computation, wait_token)
    }

    /// Settled value for a request without touching its recency.
    pub fn peek(&self, request: &R) -> Option<V> {
        let key = request.fingerprint().ok()?;
        self.inner.lock_state().entries.peek(&key).cloned()
    }

    /// Whether a settled value exists for the request.
    pub fn contains(&self, request: &R) -> bool {
        request
            .fingerprint()
            .map(|key| self.inner.lock_state().entries.contains(&key))
            .unwrap_or(false)
    }

    /// Whether a computation for the request is in flight.
    pub fn is_pending(&self, request: &R) -> bool {
        request
            .fingerprint()
            .map(|key| self.inner.lock_state().pending.contains_key(&key))
            .unwrap_or(false)
    }

    /// Change the capacity, evicting least-recently-used entries to fit.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.inner.lock_state();
        state.shrink_to(capacity, &self.inner.counters);
        debug!(cache = %self.inner.name, capacity, entries = state.entries.len(), "cache capacity changed");
    }

    /// Drop every settled entry. In-flight computations are unaffected.
    pub fn clear(&self) {
        self.inner.lock_state().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_state().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock_state().capacity
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock_state();
        self.inner
            .counters
            .snapshot(state.entries.len(), state.pending.len(), state.capacity)
    }
}

/// Run the compute future on its own task so it settles (and populates the
/// cache) even if every waiter stops polling.
fn spawn_computation<R, V>(
    inner: Weak<CacheInner<R, V>>,
    key: Fingerprint,
    computation_id: u64,
    compute: ComputeFuture<V>,
) -> SharedComputation<V>
where
    R: Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        let result = match AssertUnwindSafe(compute).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(CacheError::TaskAborted("compute function panicked".to_string())),
        };
        if let Some(inner) = inner.upgrade() {
            inner.settle(&key, computation_id, &result);
        }
        result
    });

    async move {
        match task.await {
            Ok(result) => result,
            Err(err) => Err(CacheError::TaskAborted(err.to_string())),
        }
    }
    .boxed()
    .shared()
}

fn wait<V>(computation: SharedComputation<V>, token: CancellationToken) -> ComputeFuture<V>
where
    V: Clone + Send + Sync + 'static,
{
    async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CacheError::Cancelled),
            result = computation => result,
        }
    }
    .boxed()
}
