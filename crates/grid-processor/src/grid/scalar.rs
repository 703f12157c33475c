//! Single-component grid field.

use crate::error::{GridProcessorError, Result};
use crate::grid::FieldSampler;
use crate::projection::interpolation::{bilinear_blend, bilinear_stencil, nearest_index};
use crate::types::{GridHeader, InterpolationMethod};

/// A scalar field on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    header: GridHeader,
    values: Vec<f32>,
}

impl ScalarGrid {
    /// Create a grid, validating the header and the array length.
    pub fn new(header: GridHeader, values: Vec<f32>) -> Result<Self> {
        header.validate()?;
        if values.len() != header.point_count() {
            return Err(GridProcessorError::LengthMismatch {
                expected: header.point_count(),
                actual: values.len(),
            });
        }
        Ok(Self { header, values })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Stored value at node `(i, j)`, or NaN outside the grid.
    pub fn get(&self, i: i64, j: i64) -> f32 {
        let h = &self.header;
        if i < 0 || j < 0 || i as usize >= h.nx || j as usize >= h.ny {
            return f32::NAN;
        }
        self.values[h.offset(i as usize, j as usize)]
    }

    /// Value of the node closest to `(x, y)`.
    pub fn interpolate_nearest(&self, x: f64, y: f64) -> f32 {
        let h = &self.header;
        let (fc, fr) = h.fractional_index(h.normalize_longitude(x), y);
        match (nearest_index(fc, h.nx, h.wrap_x), nearest_index(fr, h.ny, h.wrap_y)) {
            (Some(i), Some(j)) => self.values[h.offset(i, j)],
            _ => f32::NAN,
        }
    }

    /// Bilinear blend of the four nodes surrounding `(x, y)`.
    pub fn interpolate_bilinear(&self, x: f64, y: f64) -> f32 {
        let h = &self.header;
        let (fc, fr) = h.fractional_index(h.normalize_longitude(x), y);
        let Some(stencil) = bilinear_stencil(fc, fr, h.nx, h.ny, h.wrap_x, h.wrap_y) else {
            return f32::NAN;
        };
        let corners = stencil.offsets(h.nx).map(|idx| self.values[idx]);
        bilinear_blend(corners, stencil.x.weight, stencil.y.weight)
    }

    pub fn interpolate(&self, method: InterpolationMethod, x: f64, y: f64) -> f32 {
        match method {
            InterpolationMethod::Nearest => self.interpolate_nearest(x, y),
            InterpolationMethod::Bilinear => self.interpolate_bilinear(x, y),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.header.contains(x, y)
    }

    /// Minimum and maximum of the defined values, if any.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |range, &v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

impl FieldSampler for ScalarGrid {
    type Value = f32;

    fn header(&self) -> &GridHeader {
        &self.header
    }

    fn sample(&self, method: InterpolationMethod, x: f64, y: f64) -> f32 {
        self.interpolate(method, x, y)
    }
}
