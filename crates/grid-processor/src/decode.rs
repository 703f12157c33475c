//! Turning decoded host arrays into grid fields.
//!
//! The host supplies a [`GridDecoder`] that fetches raw values for a
//! [`GridRequest`]. Packed encodings are undone here: fill values become NaN
//! and `raw * scale_factor + add_offset` is applied to everything else.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::grid::{ScalarGrid, VectorGrid};
use crate::request::{GridRequest, VectorGridRequest};

/// Raw values plus the packing attributes stored alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    pub values: Vec<f32>,
    /// Multiplier applied to raw values (default 1).
    pub scale_factor: Option<f64>,
    /// Offset added after scaling (default 0).
    pub add_offset: Option<f64>,
    /// Raw value marking missing data.
    pub fill_value: Option<f32>,
}

impl DecodedArray {
    /// Unpacked values with no packing attributes.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            scale_factor: None,
            add_offset: None,
            fill_value: None,
        }
    }

    pub fn with_scale_offset(mut self, scale_factor: f64, add_offset: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self.add_offset = Some(add_offset);
        self
    }

    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Apply fill masking and scale/offset.
    pub fn into_values(self) -> Vec<f32> {
        let scale = self.scale_factor.unwrap_or(1.0);
        let offset = self.add_offset.unwrap_or(0.0);
        let fill = self.fill_value.filter(|f| !f.is_nan());
        let mut values = self.values;

        if scale == 1.0 && offset == 0.0 && fill.is_none() {
            return values;
        }
        for v in values.iter_mut() {
            *v = if Some(*v) == fill {
                f32::NAN
            } else {
                (*v as f64 * scale + offset) as f32
            };
        }
        values
    }
}

/// Host-side source of raw grid values.
#[async_trait]
pub trait GridDecoder: Send + Sync {
    /// Fetch the values for one grid. Implementations should stop early with
    /// [`GridProcessorError::Cancelled`] once `token` is cancelled.
    async fn decode(&self, request: &GridRequest, token: &CancellationToken) -> Result<DecodedArray>;
}

/// Decode and validate a scalar grid.
pub async fn load_scalar_grid(
    decoder: &dyn GridDecoder,
    request: &GridRequest,
    token: &CancellationToken,
) -> Result<ScalarGrid> {
    let values = decode_checked(decoder, request, token).await?;
    debug!(url = %request.url, points = values.len(), "decoded scalar grid");
    ScalarGrid::new(request.header, values)
}

/// Decode both components of a vector grid.
pub async fn load_vector_grid(
    decoder: &dyn GridDecoder,
    request: &VectorGridRequest,
    token: &CancellationToken,
) -> Result<VectorGrid> {
    let u = decode_checked(decoder, &request.u_component(), token).await?;
    let v = decode_checked(decoder, &request.v_component(), token).await?;
    debug!(u_url = %request.u_url, v_url = %request.v_url, points = u.len(), "decoded vector grid");
    VectorGrid::new(request.header, u, v)
}

async fn decode_checked(
    decoder: &dyn GridDecoder,
    request: &GridRequest,
    token: &CancellationToken,
) -> Result<Vec<f32>> {
    if token.is_cancelled() {
        return Err(GridProcessorError::Cancelled);
    }
    let decoded = decoder.decode(request, token).await?;
    if token.is_cancelled() {
        return Err(GridProcessorError::Cancelled);
    }
    Ok(decoded.into_values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridHeader;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GridDecoder for Constant {
        async fn decode(&self, request: &GridRequest, _token: &CancellationToken) -> Result<DecodedArray> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let level = if request.url.ends_with('v') { 2.0 } else { 1.0 };
            Ok(DecodedArray::new(vec![level; request.header.point_count()]))
        }
    }

    #[test]
    fn test_scale_offset_and_fill() {
        let decoded = DecodedArray::new(vec![0.0, 10.0, -999.0])
            .with_scale_offset(0.5, 273.0)
            .with_fill_value(-999.0);
        let values = decoded.into_values();
        assert_eq!(values[0], 273.0);
        assert_eq!(values[1], 278.0);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_defaults_leave_values_alone() {
        assert_eq!(DecodedArray::new(vec![1.5, -2.0]).into_values(), vec![1.5, -2.0]);
    }

    #[tokio::test]
    async fn test_load_scalar_grid_validates_length() {
        struct Short;

        #[async_trait]
        impl GridDecoder for Short {
            async fn decode(&self, _request: &GridRequest, _token: &CancellationToken) -> Result<DecodedArray> {
                Ok(DecodedArray::new(vec![0.0; 3]))
            }
        }

        let request = GridRequest::new("t2m", GridHeader::new(0.0, 1.0, 2, 0.0, 1.0, 2));
        let err = load_scalar_grid(&Short, &request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GridProcessorError::LengthMismatch { expected: 4, actual: 3 }));
    }

    #[tokio::test]
    async fn test_load_vector_grid_decodes_both_components() {
        let decoder = Constant { calls: AtomicUsize::new(0) };
        let request = VectorGridRequest::new("wind/u", "wind/v", GridHeader::new(0.0, 1.0, 2, 0.0, 1.0, 1));
        let grid = load_vector_grid(&decoder, &request, &CancellationToken::new()).await.unwrap();
        assert_eq!(grid.get(1, 0), [1.0, 2.0]);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_decode() {
        let decoder = Constant { calls: AtomicUsize::new(0) };
        let token = CancellationToken::new();
        token.cancel();
        let request = GridRequest::new("t2m", GridHeader::new(0.0, 1.0, 2, 0.0, 1.0, 2));
        let err = load_scalar_grid(&decoder, &request, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }
}
