//! Integration tests for request collapsing, failure propagation and
//! per-consumer cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use compute_cache::{CacheError, CancellationToken, ComputeCache, RequestValue};
use tokio::sync::{mpsc, Notify};

/// Shared probes for a gated compute function.
struct Probe {
    calls: AtomicUsize,
    gate: Notify,
    cancelled_tx: mpsc::UnboundedSender<String>,
}

/// A cache whose "slow" requests block until the gate opens or their token is
/// cancelled. Every other request resolves immediately.
fn gated_cache() -> (
    ComputeCache<RequestValue, String>,
    Arc<Probe>,
    mpsc::UnboundedReceiver<String>,
) {
    let (cancelled_tx, cancelled_rx) = mpsc::unbounded_channel();
    let probe = Arc::new(Probe {
        calls: AtomicUsize::new(0),
        gate: Notify::new(),
        cancelled_tx,
    });

    let shared = Arc::clone(&probe);
    let cache = ComputeCache::with_capacity("gated", 8, move |req: RequestValue, token: CancellationToken| {
        let probe = Arc::clone(&shared);
        async move {
            probe.calls.fetch_add(1, Ordering::SeqCst);
            let name = match &req {
                RequestValue::Str(name) => name.clone(),
                other => format!("{other:?}"),
            };
            if !name.starts_with("slow") {
                return Ok(name);
            }
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = probe.cancelled_tx.send(name);
                    Err(CacheError::Cancelled)
                }
                _ = probe.gate.notified() => Ok(name),
            }
        }
    });

    (cache, probe, cancelled_rx)
}

fn req(name: &str) -> RequestValue {
    RequestValue::from(name)
}

async fn expect_cancelled(rx: &mut mpsc::UnboundedReceiver<String>, name: &str) {
    let observed = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("compute never observed cancellation");
    assert_eq!(observed.as_deref(), Some(name));
}

/// Keep opening the gate, one computation at a time, until `wait` settles.
async fn release_until<T>(probe: &Probe, wait: impl Future<Output = T>) -> T {
    tokio::pin!(wait);
    loop {
        probe.gate.notify_one();
        tokio::select! {
            out = &mut wait => return out,
            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
        }
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_one_computation() {
    let (cache, probe, _rx) = gated_cache();
    let consumers: Vec<_> = (0..5).map(|_| cache.consumer()).collect();

    let waits: Vec<_> = consumers.iter().map(|c| c.get(req("slow-grid"))).collect();
    assert!(cache.is_pending(&req("slow-grid")));

    probe.gate.notify_one();
    let results = futures::future::join_all(waits).await;

    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap(), "slow-grid");
    }
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.joins, 4);
    assert_eq!(stats.pending, 0);
    assert!(cache.contains(&req("slow-grid")));
}

#[tokio::test]
async fn test_failure_reaches_every_joiner_and_is_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let (counter, opened) = (Arc::clone(&calls), Arc::clone(&gate));
    let cache = ComputeCache::with_capacity("flaky", 4, move |_req: RequestValue, _token| {
        let counter = Arc::clone(&counter);
        let opened = Arc::clone(&opened);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            opened.notified().await;
            if attempt == 0 {
                Err(CacheError::failed_msg("store unavailable"))
            } else {
                Ok(42u32)
            }
        }
    });

    let a = cache.consumer();
    let b = cache.consumer();
    let first = a.get(req("t2m"));
    let second = b.get(req("t2m"));
    gate.notify_one();

    let (first, second) = tokio::join!(first, second);
    for result in [first, second] {
        match result {
            Err(CacheError::Failed(err)) => assert_eq!(err.to_string(), "store unavailable"),
            other => panic!("expected failure, got {other:?}"),
        }
    }
    assert!(!cache.contains(&req("t2m")));
    assert!(!cache.is_pending(&req("t2m")));

    // A later call retries from scratch.
    let retry = a.get(req("t2m"));
    gate.notify_one();
    assert_eq!(retry.await.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().failures, 1);
}

#[tokio::test]
async fn test_new_request_cancels_own_superseded_request() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();
    let b = cache.consumer();

    let superseded = a.get(req("slow-r1"));
    let current = a.get(req("r2"));

    assert_eq!(current.await.unwrap(), "r2");
    assert!(superseded.await.unwrap_err().is_cancelled());
    expect_cancelled(&mut cancelled, "slow-r1").await;

    // B is unaffected: it starts a fresh computation and resolves normally.
    let other = b.get(req("slow-r1"));
    probe.gate.notify_one();
    assert_eq!(other.await.unwrap(), "slow-r1");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_superseding_does_not_disturb_other_joined_consumer() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();
    let b = cache.consumer();

    let a_wait = a.get(req("slow-r1"));
    let b_wait = b.get(req("slow-r1"));
    let a_next = a.get(req("r2"));

    assert_eq!(a_next.await.unwrap(), "r2");
    assert!(matches!(a_wait.await, Err(CacheError::Cancelled)));

    probe.gate.notify_one();
    assert_eq!(b_wait.await.unwrap(), "slow-r1");

    // The shared computation itself was never cancelled.
    assert!(cancelled.try_recv().is_err());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    assert!(cache.contains(&req("slow-r1")));
}

#[tokio::test]
async fn test_repeating_same_request_keeps_waiting() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();

    let first = a.get(req("slow-r1"));
    let again = a.get(req("slow-r1"));
    assert!(a.has_pending());

    probe.gate.notify_one();
    let (first, again) = tokio::join!(first, again);
    assert_eq!(first.unwrap(), "slow-r1");
    assert_eq!(again.unwrap(), "slow-r1");
    assert!(cancelled.try_recv().is_err());
    assert!(!a.has_pending());
}

#[tokio::test]
async fn test_cached_values_survive_cancellation() {
    let (cache, _probe, mut cancelled) = gated_cache();
    let a = cache.consumer();

    a.get(req("r0")).await.unwrap();
    let slow = a.get(req("slow-r1"));
    a.cancel();

    assert!(slow.await.unwrap_err().is_cancelled());
    expect_cancelled(&mut cancelled, "slow-r1").await;
    assert!(cache.contains(&req("r0")));
}

#[tokio::test]
async fn test_dropping_handle_releases_its_request() {
    let (cache, _probe, mut cancelled) = gated_cache();
    let a = cache.consumer();

    let wait = a.get(req("slow-r1"));
    drop(a);

    assert!(matches!(wait.await, Err(CacheError::Cancelled)));
    expect_cancelled(&mut cancelled, "slow-r1").await;
    assert!(!cache.is_pending(&req("slow-r1")));
}

#[tokio::test]
async fn test_timeout_raises_cooperative_cancellation() {
    let (cache, _probe, mut cancelled) = gated_cache();
    let a = cache.consumer();

    let err = a
        .get_with_timeout(req("slow-r1"), Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::TimedOut(_)));
    assert!(err.is_cancelled());
    expect_cancelled(&mut cancelled, "slow-r1").await;
}

#[tokio::test]
async fn test_consumers_on_different_keys_are_independent() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();
    let b = cache.consumer();

    let b_wait = b.get(req("slow-b"));
    let a_first = a.get(req("slow-a"));
    let a_second = a.get(req("r2"));

    assert_eq!(a_second.await.unwrap(), "r2");
    assert!(a_first.await.unwrap_err().is_cancelled());
    expect_cancelled(&mut cancelled, "slow-a").await;

    probe.gate.notify_one();
    assert_eq!(b_wait.await.unwrap(), "slow-b");
}

#[tokio::test]
async fn test_dropping_owned_wait_releases_request() {
    let (cache, probe, mut cancelled) = gated_cache();

    let wait = cache.consumer().get_owned(req("slow-r1"));
    assert!(cache.is_pending(&req("slow-r1")));
    drop(wait);

    expect_cancelled(&mut cancelled, "slow-r1").await;
    assert!(!cache.is_pending(&req("slow-r1")));

    // A completed owned wait leaves the value cached.
    let value = cache.consumer().get_owned(req("r2")).await.unwrap();
    assert_eq!(value, "r2");
    assert!(cache.contains(&req("r2")));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_hit_on_other_key_keeps_pending_request() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();

    assert_eq!(a.get(req("r0")).await.unwrap(), "r0");
    let mut slow = tokio_test::task::spawn(a.get(req("slow-r1")));
    tokio_test::assert_pending!(slow.poll());

    // Served synchronously from the cache.
    let mut hit = tokio_test::task::spawn(a.get(req("r0")));
    assert_eq!(tokio_test::assert_ready_ok!(hit.poll()), "r0");
    assert!(a.has_pending());

    probe.gate.notify_one();
    let value = loop {
        if let Poll::Ready(value) = slow.poll() {
            break value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(value.unwrap(), "slow-r1");
    assert!(cancelled.try_recv().is_err());
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().cancellations, 0);
}

#[tokio::test]
async fn test_joining_other_key_moves_slot_without_cancelling() {
    let (cache, probe, mut cancelled) = gated_cache();
    let a = cache.consumer();
    let b = cache.consumer();

    let a_first = a.get(req("slow-r1"));
    let b_wait = b.get(req("slow-r2"));
    let a_joined = a.get(req("slow-r2"));
    assert!(cache.is_pending(&req("slow-r1")));
    assert!(a.has_pending());

    let (first, joined, other) = release_until(&probe, async { tokio::join!(a_first, a_joined, b_wait) }).await;
    assert_eq!(first.unwrap(), "slow-r1");
    assert_eq!(joined.unwrap(), "slow-r2");
    assert_eq!(other.unwrap(), "slow-r2");

    assert!(cancelled.try_recv().is_err());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    assert!(cache.contains(&req("slow-r1")));
    assert_eq!(cache.stats().joins, 1);
}
