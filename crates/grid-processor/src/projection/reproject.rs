//! Resampling a source grid into a destination raster.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{InverseProjection, Visibility};
use crate::cooperative::{CooperativeBudget, DEFAULT_YIELD_BUDGET};
use crate::error::{GridProcessorError, Result};
use crate::grid::FieldSampler;
use crate::types::{raster_len, FieldValue, InterpolationMethod, PixelField};

/// Reprojects grids onto a destination raster through an inverse projection.
///
/// Work is split into rows. After each row the reprojector yields if the
/// current time slice is spent and then checks the cancellation token, so a
/// cancelled reprojection returns [`GridProcessorError::Cancelled`] and never
/// a partially filled raster.
#[derive(Debug, Clone, Copy)]
pub struct Reprojector {
    method: InterpolationMethod,
    yield_budget: Duration,
}

impl Default for Reprojector {
    fn default() -> Self {
        Self::new(InterpolationMethod::Bilinear, DEFAULT_YIELD_BUDGET)
    }
}

impl Reprojector {
    pub fn new(method: InterpolationMethod, yield_budget: Duration) -> Self {
        Self { method, yield_budget }
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    pub fn yield_budget(&self) -> Duration {
        self.yield_budget
    }

    /// Sample `source` at every visible pixel of a `width` x `height` raster.
    ///
    /// Pixels that are masked out, fail to invert, or land on missing source
    /// data hold the value type's missing sentinel.
    pub async fn reproject<S, P, M>(
        &self,
        width: usize,
        height: usize,
        source: &S,
        inverse: &P,
        mask: &M,
        token: &CancellationToken,
    ) -> Result<PixelField<S::Value>>
    where
        S: FieldSampler + ?Sized,
        P: InverseProjection + ?Sized,
        M: Visibility + ?Sized,
    {
        if let Some((mw, mh)) = mask.dimensions() {
            if (mw, mh) != (width, height) {
                return Err(GridProcessorError::invalid_raster(format!(
                    "mask is {mw}x{mh}, raster is {width}x{height}"
                )));
            }
        }

        let len = raster_len(width, height)?;
        let start = Instant::now();
        let mut budget = CooperativeBudget::new(token.clone(), self.yield_budget);
        budget.check()?;

        let mut values = vec![S::Value::MISSING; len];
        for y in 0..height {
            let row = &mut values[y * width..(y + 1) * width];
            for (x, out) in row.iter_mut().enumerate() {
                if !mask.is_visible(x, y) {
                    continue;
                }
                if let Some((sx, sy)) = inverse.invert(x as f64, y as f64) {
                    *out = source.sample(self.method, sx, sy);
                }
            }
            budget.checkpoint().await?;
        }

        debug!(
            width,
            height,
            rows = height,
            yields = budget.yields(),
            method = %self.method,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reprojected grid"
        );
        PixelField::new(width, height, values)
    }
}
