//! Common test fixtures for field sampling and reprojection tests.
//!
//! This module provides pre-defined grid geometries and views that
//! represent common scenarios.

use grid_processor::{GridHeader, GridRequest, ScalarGrid, VectorGridRequest, ViewState};

/// Common grid geometries for testing.
pub mod headers {
    use grid_processor::GridHeader;

    /// 3x3 index-space grid with unit steps.
    pub fn sample_3x3() -> GridHeader {
        GridHeader::new(0.0, 1.0, 3, 0.0, 1.0, 3)
    }

    /// Three longitudes (0, 120, 240) on two latitude rows. Wraps.
    pub fn geographic_ring() -> GridHeader {
        GridHeader::geographic(0.0, 120.0, 3, 0.0, 1.0, 2)
    }

    /// GFS global grid (0.25 degree), 0-360 longitudes, north to south.
    pub fn gfs_global() -> GridHeader {
        GridHeader::geographic(0.0, 0.25, 1440, 90.0, -0.25, 721)
    }

    /// 1 degree global grid in the -180..180 convention, south to north.
    pub fn global_1deg_centered() -> GridHeader {
        GridHeader::geographic(-180.0, 1.0, 360, -90.0, 1.0, 181)
    }

    /// Regional CONUS-like grid. Does not wrap.
    pub fn conus_regional() -> GridHeader {
        GridHeader::geographic(-130.0, 0.5, 141, 20.0, 0.5, 71)
    }
}

/// The 3x3 grid with values 10, 20, ..., 90 in row-major order.
pub fn sample_grid() -> ScalarGrid {
    let values = (1..=9).map(|v| v as f32 * 10.0).collect();
    ScalarGrid::new(headers::sample_3x3(), values).expect("valid 3x3 fixture")
}

/// Ring whose rows both hold 10, 20, 30.
pub fn ring_grid() -> ScalarGrid {
    let values = vec![10.0, 20.0, 30.0, 10.0, 20.0, 30.0];
    ScalarGrid::new(headers::geographic_ring(), values).expect("valid ring fixture")
}

/// A scalar request for `url` on `header`.
pub fn grid_request(url: &str, header: GridHeader) -> GridRequest {
    GridRequest::new(url, header)
}

/// A u/v request whose component urls are `<base>/u` and `<base>/v`.
pub fn wind_request(base: &str, header: GridHeader) -> VectorGridRequest {
    VectorGridRequest::new(format!("{base}/u"), format!("{base}/v"), header)
}

/// Equirectangular view of the whole globe, `width` x `height` pixels.
pub fn equirectangular_view(width: usize, height: usize) -> ViewState {
    ViewState::new(width, height, "equirectangular")
}

/// Orthographic view centred on `(lon, lat)`.
pub fn orthographic_view(width: usize, height: usize, lon: f64, lat: f64) -> ViewState {
    ViewState::new(width, height, "orthographic").with_rotation([-lon, -lat, 0.0])
}
