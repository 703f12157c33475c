//! Shared test utilities for the field cache workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Grid data generators
//! - Common fixtures (grid geometries, views)
//! - In-memory host collaborators ([`MemoryDecoder`], [`SimpleProjections`])
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in integration tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MemoryDecoder, SimpleProjections};
//! ```

pub mod fixtures;
pub mod generators;
pub mod mocks;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use mocks::*;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Macro for approximate floating-point equality assertions.
///
/// NaN on both sides counts as equal, since NaN marks missing data.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(f32::NAN, f32::NAN, 0.001);      // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        if !(left.is_nan() && right.is_nan()) {
            let diff = (left - right).abs();
            if !(diff <= epsilon) {
                panic!(
                    "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                    left, right, diff, epsilon
                );
            }
        }
    }};
}
