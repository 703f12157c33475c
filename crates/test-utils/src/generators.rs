//! Test data generators for creating synthetic field data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that sampling hits the intended node by
/// checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Values that are linear in the column index: `offset + slope * col`.
///
/// Bilinear sampling of such a grid returns exactly `offset + slope * x` for
/// any fractional column `x`, which makes expected values easy to state.
pub fn create_linear_x_grid(width: usize, height: usize, offset: f32, slope: f32) -> Vec<f32> {
    (0..height)
        .flat_map(|_| (0..width).map(move |col| offset + slope * col as f32))
        .collect()
}

/// Creates a temperature-like grid in Kelvin.
///
/// Values range from 250K at the first node to roughly 310K at the last,
/// increasing along both axes.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(250.0 + (x_factor * 30.0) + (y_factor * 30.0));
        }
    }
    data
}

/// Creates a U-component wind grid (west-east), varying by row.
pub fn create_u_wind_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let lat_factor = (row as f32 / height.max(1) as f32 - 0.5) * 2.0; // -1 to 1
        data.extend(std::iter::repeat(lat_factor * 20.0).take(width));
    }
    data
}

/// Creates a V-component wind grid (south-north), varying by column.
pub fn create_v_wind_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let lon_factor = (col as f32 / width.max(1) as f32 * std::f32::consts::TAU).sin();
            data.push(lon_factor * 10.0);
        }
    }
    data
}

/// Creates a grid with NaN at the given `(col, row)` nodes and `value`
/// everywhere else.
pub fn create_grid_with_nans(width: usize, height: usize, value: f32, nan_nodes: &[(usize, usize)]) -> Vec<f32> {
    let mut data = vec![value; width * height];
    for &(col, row) in nan_nodes {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// RGBA pixels whose alpha is non-zero inside a centred disc, as a canvas
/// filled with the globe outline would produce.
pub fn create_disc_alpha_pixels(width: usize, height: usize) -> Vec<u8> {
    let (cx, cy) = ((width as f64 - 1.0) / 2.0, (height as f64 - 1.0) / 2.0);
    let radius = width.min(height) as f64 / 2.0;
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let inside = (x as f64 - cx).hypot(y as f64 - cy) <= radius;
            pixels.extend_from_slice(&[255, 255, 255, if inside { 255 } else { 0 }]);
        }
    }
    pixels
}
