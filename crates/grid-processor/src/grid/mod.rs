//! Regular-grid fields with nearest and bilinear sampling.
//!
//! A grid owns its [`GridHeader`] and one value array per component. All
//! sampling goes through the shared stencils in
//! [`projection::interpolation`](crate::projection::interpolation), so scalar
//! and vector grids agree on wrapping and edge handling.

pub mod scalar;
pub mod vector;

pub use scalar::ScalarGrid;
pub use vector::VectorGrid;

use crate::types::{FieldValue, GridHeader, InterpolationMethod};

/// A grid that can be sampled at source coordinates.
pub trait FieldSampler: Send + Sync {
    /// Sample type produced per point.
    type Value: FieldValue;

    fn header(&self) -> &GridHeader;

    /// Sample at `(x, y)` in the grid's own coordinates.
    fn sample(&self, method: InterpolationMethod, x: f64, y: f64) -> Self::Value;
}

impl<S: FieldSampler + ?Sized> FieldSampler for std::sync::Arc<S> {
    type Value = S::Value;

    fn header(&self) -> &GridHeader {
        (**self).header()
    }

    fn sample(&self, method: InterpolationMethod, x: f64, y: f64) -> Self::Value {
        (**self).sample(method, x, y)
    }
}
