//! Index arithmetic for grid interpolation.
//!
//! These helpers work on fractional indices only; grid types apply them to
//! their own value arrays so scalar and vector grids share one stencil.

/// Resolve an axis index, wrapping it when the axis is periodic.
fn resolve_index(index: i64, n: usize, wrap: bool) -> Option<usize> {
    let n = n as i64;
    if wrap {
        Some(index.rem_euclid(n) as usize)
    } else if (0..n).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

/// Fold a fractional index into `[0, n]` on a periodic axis so the integer
/// cast below cannot saturate.
fn reduce_periodic(fractional: f64, n: usize, wrap: bool) -> f64 {
    if wrap {
        fractional.rem_euclid(n as f64)
    } else {
        fractional
    }
}

/// Nearest node index along one axis.
///
/// Rounds half-up. Returns `None` for non-finite input or an index outside
/// a non-wrapping axis.
pub fn nearest_index(fractional: f64, n: usize, wrap: bool) -> Option<usize> {
    if !fractional.is_finite() {
        return None;
    }
    let index = (reduce_periodic(fractional, n, wrap) + 0.5).floor() as i64;
    resolve_index(index, n, wrap)
}

/// Lower/upper node indices and upper weight along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStencil {
    pub lower: usize,
    pub upper: usize,
    pub weight: f64,
}

/// Bracketing nodes for a fractional index along one axis.
///
/// Both nodes must exist on a non-wrapping axis, so a query on the last node
/// has no stencil.
pub fn axis_stencil(fractional: f64, n: usize, wrap: bool) -> Option<AxisStencil> {
    if !fractional.is_finite() {
        return None;
    }
    let fractional = reduce_periodic(fractional, n, wrap);
    let floor = fractional.floor();
    let weight = fractional - floor;
    let i0 = floor as i64;
    let lower = resolve_index(i0, n, wrap)?;
    let upper = resolve_index(i0.checked_add(1)?, n, wrap)?;
    Some(AxisStencil { lower, upper, weight })
}

/// The four corners and weights of a bilinear sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearStencil {
    pub x: AxisStencil,
    pub y: AxisStencil,
}

impl BilinearStencil {
    /// Flat offsets of the corners `(i0,j0)`, `(i1,j0)`, `(i0,j1)`, `(i1,j1)`
    /// in a row-major array of width `nx`.
    pub fn offsets(&self, nx: usize) -> [usize; 4] {
        let (i0, i1) = (self.x.lower, self.x.upper);
        let (j0, j1) = (self.y.lower, self.y.upper);
        [j0 * nx + i0, j0 * nx + i1, j1 * nx + i0, j1 * nx + i1]
    }
}

/// Build the bilinear stencil for fractional indices `(fc, fr)`.
pub fn bilinear_stencil(
    fc: f64,
    fr: f64,
    nx: usize,
    ny: usize,
    wrap_x: bool,
    wrap_y: bool,
) -> Option<BilinearStencil> {
    Some(BilinearStencil {
        x: axis_stencil(fc, nx, wrap_x)?,
        y: axis_stencil(fr, ny, wrap_y)?,
    })
}

/// Blend four corner values: along x at both rows, then along y.
///
/// Any NaN corner makes the result NaN.
pub fn bilinear_blend(corners: [f32; 4], u: f64, v: f64) -> f32 {
    if corners.iter().any(|c| c.is_nan()) {
        return f32::NAN;
    }
    let [v00, v10, v01, v11] = corners.map(f64::from);
    let top = v00 * (1.0 - u) + v10 * u;
    let bottom = v01 * (1.0 - u) + v11 * u;
    (top * (1.0 - v) + bottom * v) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_rounds_half_up() {
        assert_eq!(nearest_index(0.49, 3, false), Some(0));
        assert_eq!(nearest_index(0.5, 3, false), Some(1));
        assert_eq!(nearest_index(1.5, 3, false), Some(2));
        assert_eq!(nearest_index(-0.4, 3, false), Some(0));
    }

    #[test]
    fn test_nearest_wraps_periodic_axis() {
        assert_eq!(nearest_index(-1.0, 4, true), Some(3));
        assert_eq!(nearest_index(3.6, 4, true), Some(0));
        assert_eq!(nearest_index(-1.0, 4, false), None);
        assert_eq!(nearest_index(3.6, 4, false), None);
        assert_eq!(nearest_index(f64::NAN, 4, true), None);
    }

    #[test]
    fn test_axis_stencil_interior() {
        let s = axis_stencil(1.25, 4, false).unwrap();
        assert_eq!((s.lower, s.upper), (1, 2));
        assert!((s.weight - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_axis_stencil_needs_upper_node() {
        assert!(axis_stencil(2.0, 3, false).is_none());
        assert!(axis_stencil(0.0, 1, false).is_none());
        assert!(axis_stencil(2.5, 3, false).is_none());
        assert!(axis_stencil(-0.1, 3, false).is_none());

        let s = axis_stencil(1.0, 3, false).unwrap();
        assert_eq!((s.lower, s.upper), (1, 2));
        assert_eq!(s.weight, 0.0);
    }

    #[test]
    fn test_huge_indices_stay_in_range() {
        for fractional in [1e300, -1e300, f64::MAX, i64::MAX as f64] {
            let s = axis_stencil(fractional, 3, true).unwrap();
            assert!(s.lower < 3 && s.upper < 3, "{fractional}: {s:?}");
            assert!((0.0..1.0).contains(&s.weight));
            assert!(nearest_index(fractional, 3, true).is_some_and(|i| i < 3));

            assert!(axis_stencil(fractional, 3, false).is_none());
            assert!(nearest_index(fractional, 3, false).is_none());
        }
    }

    #[test]
    fn test_axis_stencil_wrap_seam() {
        let s = axis_stencil(2.5, 3, true).unwrap();
        assert_eq!((s.lower, s.upper), (2, 0));

        let s = axis_stencil(-0.5, 3, true).unwrap();
        assert_eq!((s.lower, s.upper), (2, 0));
        assert!((s.weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_blend() {
        assert_eq!(bilinear_blend([10.0, 20.0, 40.0, 50.0], 0.5, 0.5), 30.0);
        assert_eq!(bilinear_blend([10.0, 20.0, 40.0, 50.0], 0.0, 0.0), 10.0);
        assert!(bilinear_blend([10.0, f32::NAN, 40.0, 50.0], 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_stencil_offsets() {
        let stencil = bilinear_stencil(0.5, 1.5, 3, 3, false, false).unwrap();
        assert_eq!(stencil.offsets(3), [3, 4, 6, 7]);
    }
}
