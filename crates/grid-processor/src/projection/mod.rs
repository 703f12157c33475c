//! Projection utilities for grid processing.
//!
//! This module handles the destination side of a reprojection: inverting
//! raster pixels to source coordinates, masking invisible pixels, and
//! resampling a grid into a [`PixelField`](crate::types::PixelField).

pub mod interpolation;
pub mod mask;
pub mod reproject;

pub use interpolation::{bilinear_blend, bilinear_stencil, nearest_index, BilinearStencil};
pub use mask::{Visibility, VisibilityMask};
pub use reproject::Reprojector;

/// Maps a destination pixel back to source grid coordinates.
///
/// Returning `None` means the pixel has no source location (off the globe,
/// outside the projection's domain).
pub trait InverseProjection: Send + Sync {
    fn invert(&self, px: f64, py: f64) -> Option<(f64, f64)>;
}

impl<F> InverseProjection for F
where
    F: Fn(f64, f64) -> Option<(f64, f64)> + Send + Sync,
{
    fn invert(&self, px: f64, py: f64) -> Option<(f64, f64)> {
        self(px, py)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_inverse_projection() {
        let shift = |px: f64, py: f64| (px >= 0.0).then_some((px + 10.0, py - 10.0));
        assert_eq!(shift.invert(1.0, 2.0), Some((11.0, -8.0)));
        assert_eq!(shift.invert(-1.0, 2.0), None);

        let shared: std::sync::Arc<dyn InverseProjection> = std::sync::Arc::new(shift);
        assert_eq!(shared.as_ref().invert(0.0, 0.0), Some((10.0, -10.0)));
    }
}
