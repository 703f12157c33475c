//! Error types for the compute cache.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while canonicalizing a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// A mapping was built with the same key twice.
    #[error("duplicate mapping key {0:?} in request")]
    DuplicateKey(String),

    /// The request could not be expressed as a structural value.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl FingerprintError {
    /// Create an Invalid error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Errors returned to callers of the compute cache.
///
/// Every caller joined on the same computation receives a clone of the same
/// error, so the type is cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The caller's request was superseded or its consumer went away.
    #[error("computation cancelled")]
    Cancelled,

    /// The caller gave up waiting after the given duration.
    #[error("computation timed out after {0:?}")]
    TimedOut(Duration),

    /// The host compute function failed.
    #[error("computation failed: {0}")]
    Failed(Arc<anyhow::Error>),

    /// The request could not be fingerprinted.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// The compute task panicked or was torn down by the runtime.
    #[error("computation task aborted: {0}")]
    TaskAborted(String),

    /// The consumer handle belongs to a different cache instance.
    #[error("consumer handle {0} is not registered with this cache")]
    ForeignConsumer(u64),
}

impl CacheError {
    /// Wrap a host failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(err.into()))
    }

    /// Create a Failed error from a message.
    pub fn failed_msg(msg: impl Into<String>) -> Self {
        Self::Failed(Arc::new(anyhow::anyhow!(msg.into())))
    }

    /// True for cancellation and timeout, which are expected control flow
    /// rather than hard failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut(_))
    }
}

/// Result type for compute cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
