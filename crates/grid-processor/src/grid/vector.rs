//! Two-component (u, v) grid field.

use crate::error::{GridProcessorError, Result};
use crate::grid::FieldSampler;
use crate::projection::interpolation::{bilinear_blend, bilinear_stencil, nearest_index};
use crate::types::{GridHeader, InterpolationMethod};

const MISSING: [f32; 2] = [f32::NAN, f32::NAN];

/// A vector field, such as wind, stored as separate u and v arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGrid {
    header: GridHeader,
    u: Vec<f32>,
    v: Vec<f32>,
}

impl VectorGrid {
    /// Create a grid, validating the header and both component lengths.
    pub fn new(header: GridHeader, u: Vec<f32>, v: Vec<f32>) -> Result<Self> {
        header.validate()?;
        for component in [&u, &v] {
            if component.len() != header.point_count() {
                return Err(GridProcessorError::LengthMismatch {
                    expected: header.point_count(),
                    actual: component.len(),
                });
            }
        }
        Ok(Self { header, u, v })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn u(&self) -> &[f32] {
        &self.u
    }

    pub fn v(&self) -> &[f32] {
        &self.v
    }

    fn at(&self, idx: usize) -> [f32; 2] {
        [self.u[idx], self.v[idx]]
    }

    /// Stored pair at node `(i, j)`, or NaN pair outside the grid.
    pub fn get(&self, i: i64, j: i64) -> [f32; 2] {
        let h = &self.header;
        if i < 0 || j < 0 || i as usize >= h.nx || j as usize >= h.ny {
            return MISSING;
        }
        self.at(h.offset(i as usize, j as usize))
    }

    pub fn interpolate_nearest(&self, x: f64, y: f64) -> [f32; 2] {
        let h = &self.header;
        let (fc, fr) = h.fractional_index(h.normalize_longitude(x), y);
        match (nearest_index(fc, h.nx, h.wrap_x), nearest_index(fr, h.ny, h.wrap_y)) {
            (Some(i), Some(j)) => self.at(h.offset(i, j)),
            _ => MISSING,
        }
    }

    /// Blend each component with the same stencil.
    pub fn interpolate_bilinear(&self, x: f64, y: f64) -> [f32; 2] {
        let h = &self.header;
        let (fc, fr) = h.fractional_index(h.normalize_longitude(x), y);
        let Some(stencil) = bilinear_stencil(fc, fr, h.nx, h.ny, h.wrap_x, h.wrap_y) else {
            return MISSING;
        };
        let offsets = stencil.offsets(h.nx);
        let (u, v) = (stencil.x.weight, stencil.y.weight);
        [
            bilinear_blend(offsets.map(|idx| self.u[idx]), u, v),
            bilinear_blend(offsets.map(|idx| self.v[idx]), u, v),
        ]
    }

    pub fn interpolate(&self, method: InterpolationMethod, x: f64, y: f64) -> [f32; 2] {
        match method {
            InterpolationMethod::Nearest => self.interpolate_nearest(x, y),
            InterpolationMethod::Bilinear => self.interpolate_bilinear(x, y),
        }
    }

    /// Speed `sqrt(u² + v²)` at `(x, y)`, bilinearly sampled.
    pub fn magnitude(&self, x: f64, y: f64) -> f32 {
        let [u, v] = self.interpolate_bilinear(x, y);
        u.hypot(v)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.header.contains(x, y)
    }
}

impl FieldSampler for VectorGrid {
    type Value = [f32; 2];

    fn header(&self) -> &GridHeader {
        &self.header
    }

    fn sample(&self, method: InterpolationMethod, x: f64, y: f64) -> [f32; 2] {
        self.interpolate(method, x, y)
    }
}
