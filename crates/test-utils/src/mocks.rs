//! In-memory host collaborators for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use compute_cache::CancellationToken;
use grid_processor::{
    DecodedArray, GridDecoder, GridProcessorError, GridRequest, InverseProjection, ProjectionProvider, Result,
    ViewState, VisibilityMask,
};

/// A decoder serving arrays from memory.
///
/// Urls marked with [`hold`](Self::hold) block until [`release`](Self::release)
/// is called or the decode is cancelled. Cancelled urls are recorded.
#[derive(Default)]
pub struct MemoryDecoder {
    arrays: Mutex<HashMap<String, DecodedArray>>,
    calls: Mutex<HashMap<String, usize>>,
    held: Mutex<HashSet<String>>,
    released: CancellationToken,
    cancelled: Mutex<Vec<String>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_array(self, url: &str, array: DecodedArray) -> Self {
        self.insert(url, array);
        self
    }

    pub fn with_values(self, url: &str, values: Vec<f32>) -> Self {
        self.with_array(url, DecodedArray::new(values))
    }

    pub fn insert(&self, url: &str, array: DecodedArray) {
        self.arrays.lock().unwrap().insert(url.to_string(), array);
    }

    /// Make decodes of `url` wait for [`release`](Self::release).
    pub fn hold(&self, url: &str) {
        self.held.lock().unwrap().insert(url.to_string());
    }

    /// Let every held decode proceed.
    pub fn release(&self) {
        self.released.cancel();
    }

    /// Number of decode calls for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Urls whose decode observed cancellation, in order.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl GridDecoder for MemoryDecoder {
    async fn decode(&self, request: &GridRequest, token: &CancellationToken) -> Result<DecodedArray> {
        *self.calls.lock().unwrap().entry(request.url.clone()).or_default() += 1;

        let held = self.held.lock().unwrap().contains(&request.url);
        if held {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancelled.lock().unwrap().push(request.url.clone());
                    return Err(GridProcessorError::Cancelled);
                }
                _ = self.released.cancelled() => {}
            }
        }

        self.arrays
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| GridProcessorError::decode_failed(format!("no array stored for {}", request.url)))
    }
}

/// Projection provider with two projections:
///
/// - `equirectangular`: the whole globe, longitude -180..180 left to right,
///   latitude 90..-90 top to bottom, sampled at pixel centres
/// - `orthographic`: a globe of radius `scale * min(width, height) / 2`
///   centred at `translate`, looking at `(-rotate[0], -rotate[1])`
#[derive(Debug, Default)]
pub struct SimpleProjections {
    inverse_calls: AtomicUsize,
    visibility_calls: AtomicUsize,
}

impl SimpleProjections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inverse_calls(&self) -> usize {
        self.inverse_calls.load(Ordering::SeqCst)
    }

    pub fn visibility_calls(&self) -> usize {
        self.visibility_calls.load(Ordering::SeqCst)
    }
}

fn equirectangular(view: &ViewState) -> impl Fn(f64, f64) -> Option<(f64, f64)> + Send + Sync {
    let (w, h) = (view.width as f64, view.height as f64);
    move |px, py| Some((-180.0 + (px + 0.5) * 360.0 / w, 90.0 - (py + 0.5) * 180.0 / h))
}

fn orthographic(view: &ViewState) -> impl Fn(f64, f64) -> Option<(f64, f64)> + Send + Sync {
    let radius = view.scale * view.width.min(view.height) as f64 / 2.0;
    let [tx, ty] = view.translate;
    let lambda0 = -view.rotate[0];
    let phi0 = (-view.rotate[1]).to_radians();
    move |px, py| {
        let x = (px + 0.5 - tx) / radius;
        let y = (ty - py - 0.5) / radius;
        let rho = x.hypot(y);
        if rho > 1.0 {
            return None;
        }
        if rho == 0.0 {
            return Some((lambda0, phi0.to_degrees()));
        }
        let c = rho.asin();
        let lat = (c.cos() * phi0.sin() + y * c.sin() * phi0.cos() / rho).asin();
        let lon = (x * c.sin()).atan2(rho * phi0.cos() * c.cos() - y * phi0.sin() * c.sin());
        Some((lambda0 + lon.to_degrees(), lat.to_degrees()))
    }
}

impl ProjectionProvider for SimpleProjections {
    fn inverse(&self, view: &ViewState) -> Result<Arc<dyn InverseProjection>> {
        self.inverse_calls.fetch_add(1, Ordering::SeqCst);
        match view.projection.as_str() {
            "equirectangular" => Ok(Arc::new(equirectangular(view))),
            "orthographic" => Ok(Arc::new(orthographic(view))),
            other => Err(GridProcessorError::projection(format!("unknown projection {other}"))),
        }
    }

    fn visibility(&self, view: &ViewState) -> Result<VisibilityMask> {
        self.visibility_calls.fetch_add(1, Ordering::SeqCst);
        match view.projection.as_str() {
            "equirectangular" => Ok(VisibilityMask::all_visible(view.width, view.height)),
            "orthographic" => {
                let inverse = orthographic(view);
                Ok(VisibilityMask::from_predicate(view.width, view.height, |x, y| {
                    inverse(x as f64, y as f64).is_some()
                }))
            }
            other => Err(GridProcessorError::projection(format!("unknown projection {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equirectangular_pixel_centres() {
        let view = ViewState::new(360, 180, "equirectangular");
        let inverse = SimpleProjections::new().inverse(&view).unwrap();
        assert_eq!(inverse.invert(0.0, 0.0), Some((-179.5, 89.5)));
        assert_eq!(inverse.invert(359.0, 179.0), Some((179.5, -89.5)));
    }

    #[test]
    fn test_orthographic_centre_and_outside() {
        let view = ViewState::new(101, 101, "orthographic").with_rotation([-30.0, 0.0, 0.0]);
        let projections = SimpleProjections::new();
        let inverse = projections.inverse(&view).unwrap();

        // translate defaults to the raster centre, pixel 50 spans it
        let (lon, lat) = inverse.invert(50.0, 50.0).unwrap();
        assert!((lon - 30.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
        assert_eq!(inverse.invert(0.0, 0.0), None);

        let mask = projections.visibility(&view).unwrap();
        assert!(mask.visible_count() > 0);
        assert!(mask.visible_count() < 101 * 101);
        assert_eq!(projections.visibility_calls(), 1);
    }

    #[test]
    fn test_unknown_projection() {
        let view = ViewState::new(4, 4, "mollweide");
        assert!(SimpleProjections::new().inverse(&view).is_err());
    }

    #[tokio::test]
    async fn test_memory_decoder_counts_calls() {
        let header = grid_processor::GridHeader::new(0.0, 1.0, 2, 0.0, 1.0, 1);
        let decoder = MemoryDecoder::new().with_values("a", vec![1.0, 2.0]);
        let token = CancellationToken::new();

        let decoded = decoder.decode(&GridRequest::new("a", header), &token).await.unwrap();
        assert_eq!(decoded.values, vec![1.0, 2.0]);
        assert!(decoder.decode(&GridRequest::new("b", header), &token).await.is_err());
        assert_eq!(decoder.calls("a"), 1);
        assert_eq!(decoder.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_held_decode_observes_cancellation() {
        let header = grid_processor::GridHeader::new(0.0, 1.0, 1, 0.0, 1.0, 1);
        let decoder = MemoryDecoder::new().with_values("slow", vec![1.0]);
        decoder.hold("slow");

        let token = CancellationToken::new();
        token.cancel();
        let err = decoder.decode(&GridRequest::new("slow", header), &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(decoder.cancelled(), vec!["slow".to_string()]);
    }
}
