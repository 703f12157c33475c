//! Visibility masks over destination raster pixels.

use crate::error::{GridProcessorError, Result};
use crate::types::raster_len;

/// Decides which destination pixels are worth sampling.
pub trait Visibility: Send + Sync {
    fn is_visible(&self, x: usize, y: usize) -> bool;

    /// Raster size the mask was built for, if it is a fixed buffer.
    fn dimensions(&self) -> Option<(usize, usize)> {
        None
    }
}

impl<F> Visibility for F
where
    F: Fn(usize, usize) -> bool + Send + Sync,
{
    fn is_visible(&self, x: usize, y: usize) -> bool {
        self(x, y)
    }
}

/// A precomputed per-pixel visibility buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityMask {
    width: usize,
    height: usize,
    visible: Vec<bool>,
}

impl VisibilityMask {
    pub fn new(width: usize, height: usize, visible: Vec<bool>) -> Result<Self> {
        let expected = raster_len(width, height)?;
        if visible.len() != expected {
            return Err(GridProcessorError::LengthMismatch {
                expected,
                actual: visible.len(),
            });
        }
        Ok(Self { width, height, visible })
    }

    /// Every pixel visible.
    pub fn all_visible(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            visible: vec![true; width * height],
        }
    }

    /// Evaluate a predicate once per pixel.
    pub fn from_predicate(width: usize, height: usize, predicate: impl Fn(usize, usize) -> bool) -> Self {
        let visible = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| predicate(x, y))
            .collect();
        Self { width, height, visible }
    }

    /// Build from an RGBA buffer: a pixel is visible when its alpha is non-zero.
    pub fn from_alpha(width: usize, height: usize, rgba: &[u8]) -> Result<Self> {
        let expected = raster_len(width, height)?
            .checked_mul(4)
            .ok_or_else(|| GridProcessorError::invalid_raster(format!("{width}x{height} raster is too large")))?;
        if rgba.len() != expected {
            return Err(GridProcessorError::invalid_raster(format!(
                "RGBA buffer has {} bytes, expected {} for {}x{}",
                rgba.len(),
                expected,
                width,
                height
            )));
        }
        let visible = rgba.chunks_exact(4).map(|px| px[3] > 0).collect();
        Ok(Self { width, height, visible })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of visible pixels.
    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }
}

impl Visibility for VisibilityMask {
    fn is_visible(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.visible[y * self.width + x]
    }

    fn dimensions(&self) -> Option<(usize, usize)> {
        Some((self.width, self.height))
    }
}
