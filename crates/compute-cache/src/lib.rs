//! Fingerprint-keyed asynchronous compute cache.
//!
//! This crate memoizes expensive derived artifacts (decoded grids, rasterized
//! pixel fields, visibility masks) behind a canonical fingerprint of the
//! request that produced them. It provides:
//!
//! - **Canonical keys**: structurally equal requests share one fingerprint,
//!   regardless of mapping key order
//! - **Request collapsing**: concurrent identical requests share one computation
//! - **Per-consumer cancellation**: a consumer's newer request abandons its own
//!   superseded request without disturbing anyone else
//! - **Bounded memory**: LRU eviction once the configured capacity is exceeded
//!
//! # Architecture
//!
//! ```text
//! ConsumerHandle::get(request)
//!      │
//!      ├─► fingerprint(request)
//!      │
//!      ├─► LRU hit? ──────────────► return cached value
//!      │
//!      ├─► Pending? ──────────────► join shared computation
//!      │
//!      └─► Fresh compute
//!               │
//!               ├─► cancel this consumer's superseded wait
//!               ├─► spawn compute(request, token)
//!               └─► on settle: drop pending, cache success
//! ```
//!
//! # Example
//!
//! ```ignore
//! use compute_cache::{CacheConfig, CacheError, ComputeCache, RequestValue};
//!
//! let cache = ComputeCache::new(CacheConfig::new("squares", 8), |req: RequestValue, _token| async move {
//!     Ok::<_, CacheError>(format!("{req:?}"))
//! });
//!
//! let consumer = cache.consumer();
//! let value = consumer.get(RequestValue::from(3)).await?;
//! ```

pub mod cache;
pub mod config;
pub mod consumer;
pub mod error;
pub mod fingerprint;
pub mod stats;

pub use cache::{ComputeCache, ComputeFuture};
pub use config::CacheConfig;
pub use consumer::ConsumerHandle;
pub use error::{CacheError, FingerprintError, Result};
pub use fingerprint::{fingerprint, Fingerprint, Fingerprintable, RequestValue};
pub use stats::CacheStats;

// Re-exported so hosts can write compute functions without a direct dependency.
pub use tokio_util::sync::CancellationToken;
