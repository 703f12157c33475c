//! Consumer identities for the compute cache.

use std::time::Duration;

use futures::FutureExt;

use crate::cache::{ComputeCache, ComputeFuture, ConsumerId};
use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprintable;

/// Identity of one long-lived caller, such as a single interactive view.
///
/// A handle owns at most one cancellation slot. A request for a different key
/// that starts a fresh computation resolves the handle's previous wait with
/// [`CacheError::Cancelled`], and cancels the underlying computation if no
/// other consumer is waiting on it. Cache hits leave the slot alone, and
/// joining another computation moves the slot without cancelling anything.
/// Dropping the handle releases the slot.
pub struct ConsumerHandle<R, V>
where
    R: Fingerprintable + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: ComputeCache<R, V>,
    id: ConsumerId,
}

impl<R, V> ConsumerHandle<R, V>
where
    R: Fingerprintable + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cache: ComputeCache<R, V>, id: ConsumerId) -> Self {
        Self { cache, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The cache this handle is registered with.
    pub fn cache(&self) -> &ComputeCache<R, V> {
        &self.cache
    }

    /// Resolve a request through the cache on behalf of this consumer.
    pub fn get(&self, request: R) -> ComputeFuture<V> {
        self.cache.resolve(request, self.id)
    }

    /// Resolve a request with a single-use handle.
    ///
    /// The handle lives inside the returned future, so dropping the future
    /// before it settles releases the request.
    pub fn get_owned(self, request: R) -> ComputeFuture<V> {
        let wait = self.get(request);
        async move {
            let result = wait.await;
            drop(self);
            result
        }
        .boxed()
    }

    /// Like [`get`](Self::get), but gives up after `timeout`.
    ///
    /// On expiry the handle's slot is released exactly as if the consumer had
    /// moved on, so the computation sees the usual cooperative cancellation.
    pub async fn get_with_timeout(&self, request: R, timeout: Duration) -> Result<V> {
        let wait = self.get(request);
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel();
                Err(CacheError::TimedOut(timeout))
            }
        }
    }

    /// Abandon this consumer's in-flight request, if any.
    pub fn cancel(&self) {
        self.cache.inner.release(self.id);
    }

    /// Whether this consumer is currently waiting on an in-flight computation.
    pub fn has_pending(&self) -> bool {
        self.cache.inner.has_pending_slot(self.id)
    }
}

impl<R, V> Drop for ConsumerHandle<R, V>
where
    R: Fingerprintable + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.inner.release(self.id);
    }
}

impl<R, V> std::fmt::Debug for ConsumerHandle<R, V>
where
    R: Fingerprintable + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("cache", &self.cache.name())
            .field("id", &self.id)
            .finish()
    }
}
