//! Core types for grid processing.

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Length of one longitude cycle in degrees.
pub const LONGITUDE_PERIOD: f64 = 360.0;

/// Tolerance when deciding whether a longitude axis spans a full cycle.
pub const WRAP_TOLERANCE: f64 = 1e-7;

/// Whether `n` steps of `step` degrees cover exactly one longitude cycle.
pub fn spans_full_circle(step: f64, n: usize) -> bool {
    ((n as f64 * step).abs() - LONGITUDE_PERIOD).abs() <= WRAP_TOLERANCE
}

/// Shift a longitude into the convention of a source grid starting at
/// `source_start` (0-360 vs -180-180).
pub fn align_longitude(source_start: f64, lon: f64) -> f64 {
    if lon < 0.0 && source_start >= 0.0 {
        lon + LONGITUDE_PERIOD
    } else if lon > 180.0 && source_start < 0.0 {
        lon - LONGITUDE_PERIOD
    } else {
        lon
    }
}

/// Geometry of a regular grid: origin, step and count per axis.
///
/// Node `(i, j)` sits at `(x0 + i * dx, y0 + j * dy)` and its value is stored
/// at `j * nx + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    pub x0: f64,
    pub dx: f64,
    pub nx: usize,
    pub y0: f64,
    pub dy: f64,
    pub ny: usize,
    /// x is longitude and y is latitude, in degrees.
    pub geographic: bool,
    /// Column `nx - 1` is adjacent to column 0.
    pub wrap_x: bool,
    /// Row `ny - 1` is adjacent to row 0.
    pub wrap_y: bool,
}

impl GridHeader {
    /// Create a plain (non-geographic, non-periodic) header.
    pub fn new(x0: f64, dx: f64, nx: usize, y0: f64, dy: f64, ny: usize) -> Self {
        Self {
            x0,
            dx,
            nx,
            y0,
            dy,
            ny,
            geographic: false,
            wrap_x: false,
            wrap_y: false,
        }
    }

    /// Create a longitude/latitude header. The x axis wraps when it spans a
    /// full 360° cycle.
    pub fn geographic(lon0: f64, dlon: f64, nlon: usize, lat0: f64, dlat: f64, nlat: usize) -> Self {
        Self {
            geographic: true,
            wrap_x: spans_full_circle(dlon, nlon),
            ..Self::new(lon0, dlon, nlon, lat0, dlat, nlat)
        }
    }

    /// Mark the axes of an index-space grid as periodic.
    pub fn periodic(mut self, wrap_x: bool, wrap_y: bool) -> Self {
        self.wrap_x = wrap_x;
        self.wrap_y = wrap_y;
        self
    }

    /// Validate counts, steps and wrap flags.
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(GridProcessorError::invalid_header(format!(
                "counts must be positive, got nx={} ny={}",
                self.nx, self.ny
            )));
        }
        if !self.x0.is_finite() || !self.y0.is_finite() {
            return Err(GridProcessorError::invalid_header("origin must be finite"));
        }
        if !self.dx.is_finite() || !self.dy.is_finite() || self.dx == 0.0 || self.dy == 0.0 {
            return Err(GridProcessorError::invalid_header(format!(
                "steps must be finite and non-zero, got dx={} dy={}",
                self.dx, self.dy
            )));
        }
        if self.nx.checked_mul(self.ny).is_none() {
            return Err(GridProcessorError::invalid_header(format!(
                "{}x{} nodes overflow the address space",
                self.nx, self.ny
            )));
        }
        if self.geographic && self.wrap_x != spans_full_circle(self.dx, self.nx) {
            return Err(GridProcessorError::invalid_header(format!(
                "longitude wrap flag {} disagrees with span {}",
                self.wrap_x,
                self.nx as f64 * self.dx
            )));
        }
        Ok(())
    }

    /// Number of grid nodes (`nx * ny`). Saturates for headers that fail
    /// [`validate`](Self::validate).
    pub fn point_count(&self) -> usize {
        self.nx.saturating_mul(self.ny)
    }

    /// Flat offset of node `(i, j)`.
    pub fn offset(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// Fractional column/row index of a coordinate.
    pub fn fractional_index(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x0) / self.dx, (y - self.y0) / self.dy)
    }

    /// Range of x covered by the grid: the node span, or the full period
    /// when the axis wraps.
    pub fn x_coverage(&self) -> (f64, f64) {
        let steps = if self.wrap_x { self.nx } else { self.nx.saturating_sub(1) };
        let end = self.x0 + steps as f64 * self.dx;
        (self.x0.min(end), self.x0.max(end))
    }

    fn in_x_coverage(&self, x: f64) -> bool {
        let (lo, hi) = self.x_coverage();
        match (self.wrap_x, self.dx > 0.0) {
            (true, true) => x >= lo && x < hi,
            (true, false) => x > lo && x <= hi,
            (false, _) => x >= lo && x <= hi,
        }
    }

    /// Move a query longitude into the grid's own coverage by a single
    /// ±360° shift. Coordinates of non-geographic grids pass through.
    pub fn normalize_longitude(&self, lon: f64) -> f64 {
        if !self.geographic || !lon.is_finite() || self.in_x_coverage(lon) {
            return lon;
        }
        if self.in_x_coverage(lon + LONGITUDE_PERIOD) {
            lon + LONGITUDE_PERIOD
        } else if self.in_x_coverage(lon - LONGITUDE_PERIOD) {
            lon - LONGITUDE_PERIOD
        } else {
            lon
        }
    }

    /// Whether a coordinate falls within the node domain (after longitude
    /// normalization, and always along a wrapping axis).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (fc, fr) = self.fractional_index(self.normalize_longitude(x), y);
        let x_ok = self.wrap_x || (fc >= 0.0 && fc <= self.nx.saturating_sub(1) as f64);
        let y_ok = self.wrap_y || (fr >= 0.0 && fr <= self.ny.saturating_sub(1) as f64);
        x_ok && y_ok
    }
}

/// Interpolation method for grid sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            _ => Self::Bilinear,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// A sample stored in a pixel field.
pub trait FieldValue: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Sentinel for "undefined at this pixel".
    const MISSING: Self;

    fn is_defined(&self) -> bool;
}

impl FieldValue for f32 {
    const MISSING: Self = f32::NAN;

    fn is_defined(&self) -> bool {
        !self.is_nan()
    }
}

impl FieldValue for [f32; 2] {
    const MISSING: Self = [f32::NAN, f32::NAN];

    /// Both components must be finite.
    fn is_defined(&self) -> bool {
        self[0].is_finite() && self[1].is_finite()
    }
}

/// Pixel count of a `width` x `height` raster.
pub fn raster_len(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| GridProcessorError::invalid_raster(format!("{width}x{height} raster is too large")))
}

/// Sampled values aligned to raster pixel order (row-major, top-to-bottom).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelField<T = f32> {
    width: usize,
    height: usize,
    values: Vec<T>,
}

impl<T: FieldValue> PixelField<T> {
    /// Create a pixel field, checking the array against the raster size.
    pub fn new(width: usize, height: usize, values: Vec<T>) -> Result<Self> {
        let expected = raster_len(width, height)?;
        if values.len() != expected {
            return Err(GridProcessorError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { width, height, values })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Value at pixel `(x, y)`, or the missing sentinel outside the raster.
    pub fn get(&self, x: i64, y: i64) -> T {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return T::MISSING;
        }
        self.values[y as usize * self.width + x as usize]
    }

    pub fn is_defined(&self, x: i64, y: i64) -> bool {
        self.get(x, y).is_defined()
    }

    /// Number of pixels holding a defined value.
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_defined()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_circle_detection() {
        assert!(spans_full_circle(0.25, 1440));
        assert!(spans_full_circle(120.0, 3));
        assert!(spans_full_circle(-1.0, 360));
        assert!(spans_full_circle(0.1, 3600));
        assert!(!spans_full_circle(0.25, 1439));
        assert!(!spans_full_circle(1.0, 361));
    }

    #[test]
    fn test_geographic_header_wrap_flags() {
        let global = GridHeader::geographic(0.0, 1.0, 360, -90.0, 1.0, 181);
        assert!(global.wrap_x);
        assert!(!global.wrap_y);

        let regional = GridHeader::geographic(-130.0, 0.5, 120, 20.0, 0.5, 60);
        assert!(!regional.wrap_x);
        assert!(regional.validate().is_ok());
    }

    #[test]
    fn test_header_validation() {
        assert!(GridHeader::new(0.0, 1.0, 0, 0.0, 1.0, 3).validate().is_err());
        assert!(GridHeader::new(0.0, 1.0, 3, 0.0, 1.0, 0).validate().is_err());
        assert!(GridHeader::new(0.0, 0.0, 3, 0.0, 1.0, 3).validate().is_err());
        assert!(GridHeader::new(0.0, f64::NAN, 3, 0.0, 1.0, 3).validate().is_err());
        assert!(GridHeader::new(0.0, 1.0, 3, 0.0, 1.0, 3).validate().is_ok());

        let mut forced = GridHeader::geographic(0.0, 1.0, 90, 0.0, 1.0, 10);
        forced.wrap_x = true;
        assert!(forced.validate().is_err());
    }

    #[test]
    fn test_node_count_overflow_rejected() {
        let header = GridHeader::new(0.0, 1.0, usize::MAX, 0.0, 1.0, 2);
        assert!(matches!(header.validate(), Err(GridProcessorError::InvalidHeader(_))));
        assert_eq!(header.point_count(), usize::MAX);

        let err = PixelField::<f32>::new(usize::MAX, 2, Vec::new()).unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidRaster(_)));
    }

    #[test]
    fn test_normalize_longitude_global_0_360() {
        let header = GridHeader::geographic(0.0, 120.0, 3, 0.0, 1.0, 1);
        assert_eq!(header.normalize_longitude(-120.0), 240.0);
        assert_eq!(header.normalize_longitude(-60.0), 300.0);
        assert_eq!(header.normalize_longitude(360.0), 0.0);
        assert_eq!(header.normalize_longitude(100.0), 100.0);
    }

    #[test]
    fn test_normalize_longitude_regional_grid() {
        // -180..-100 grid queried in 0-360 convention.
        let header = GridHeader::geographic(-180.0, 1.0, 81, 0.0, 1.0, 10);
        assert_eq!(header.normalize_longitude(200.0), -160.0);
        assert_eq!(header.normalize_longitude(-150.0), -150.0);
        // Nothing equivalent inside coverage: left alone.
        assert_eq!(header.normalize_longitude(10.0), 10.0);
    }

    #[test]
    fn test_non_geographic_passes_through() {
        let header = GridHeader::new(0.0, 1.0, 3, 0.0, 1.0, 3);
        assert_eq!(header.normalize_longitude(-120.0), -120.0);
    }

    #[test]
    fn test_contains() {
        let header = GridHeader::new(10.0, 2.0, 3, 0.0, -1.0, 3);
        assert!(header.contains(10.0, 0.0));
        assert!(header.contains(14.0, -2.0));
        assert!(!header.contains(14.5, -1.0));
        assert!(!header.contains(12.0, 0.5));
        assert!(!header.contains(f64::NAN, 0.0));
    }

    #[test]
    fn test_align_longitude() {
        assert_eq!(align_longitude(0.0, -90.0), 270.0);
        assert_eq!(align_longitude(-180.0, 270.0), -90.0);
        assert_eq!(align_longitude(-180.0, 90.0), 90.0);
        assert_eq!(align_longitude(0.0, 90.0), 90.0);
    }

    #[test]
    fn test_pixel_field_access() {
        let field = PixelField::new(2, 2, vec![0.0, f32::NAN, 3.0, 4.0]).unwrap();
        assert_eq!(field.get(0, 0), 0.0);
        assert!(field.is_defined(0, 0));
        assert!(!field.is_defined(1, 0));
        assert!(field.get(2, 0).is_nan());
        assert!(field.get(0, -1).is_nan());
        assert_eq!(field.get(1, 1), 4.0);
        assert_eq!(field.defined_count(), 3);
    }

    #[test]
    fn test_pixel_field_length_checked() {
        let err = PixelField::new(3, 2, vec![0.0f32; 5]).unwrap_err();
        assert!(matches!(err, GridProcessorError::LengthMismatch { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_vector_value_needs_both_components() {
        assert!([1.0f32, 2.0].is_defined());
        assert!(![1.0f32, f32::NAN].is_defined());
        assert!(![f32::INFINITY, 0.0].is_defined());
    }

    #[test]
    fn test_interpolation_method_from_str() {
        assert_eq!(InterpolationMethod::from_str("nearest"), InterpolationMethod::Nearest);
        assert_eq!(InterpolationMethod::from_str("BILINEAR"), InterpolationMethod::Bilinear);
        assert_eq!(InterpolationMethod::from_str("invalid"), InterpolationMethod::Bilinear);
    }
}
