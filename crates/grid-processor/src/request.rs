//! Typed cache requests for the field pipeline.

use compute_cache::{FingerprintError, Fingerprintable, RequestValue};
use serde::{Deserialize, Serialize};

use crate::types::GridHeader;

fn header_value(header: &GridHeader) -> Result<RequestValue, FingerprintError> {
    RequestValue::try_map([
        ("x0", RequestValue::from(header.x0)),
        ("dx", header.dx.into()),
        ("nx", header.nx.into()),
        ("y0", header.y0.into()),
        ("dy", header.dy.into()),
        ("ny", header.ny.into()),
        ("geographic", header.geographic.into()),
        ("wrap_x", header.wrap_x.into()),
        ("wrap_y", header.wrap_y.into()),
    ])
}

/// One scalar grid to decode: a store location, its geometry, and optional
/// time/level slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRequest {
    pub url: String,
    pub header: GridHeader,
    pub time_index: Option<u32>,
    pub level_index: Option<u32>,
}

impl GridRequest {
    pub fn new(url: impl Into<String>, header: GridHeader) -> Self {
        Self {
            url: url.into(),
            header,
            time_index: None,
            level_index: None,
        }
    }

    pub fn at_time(mut self, time_index: u32) -> Self {
        self.time_index = Some(time_index);
        self
    }

    pub fn at_level(mut self, level_index: u32) -> Self {
        self.level_index = Some(level_index);
        self
    }
}

impl Fingerprintable for GridRequest {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        RequestValue::try_map([
            ("url", RequestValue::from(self.url.as_str())),
            ("header", header_value(&self.header)?),
            ("time", self.time_index.into()),
            ("level", self.level_index.into()),
        ])
    }
}

/// A u/v pair of grids sharing one geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGridRequest {
    pub u_url: String,
    pub v_url: String,
    pub header: GridHeader,
    pub time_index: Option<u32>,
    pub level_index: Option<u32>,
}

impl VectorGridRequest {
    pub fn new(u_url: impl Into<String>, v_url: impl Into<String>, header: GridHeader) -> Self {
        Self {
            u_url: u_url.into(),
            v_url: v_url.into(),
            header,
            time_index: None,
            level_index: None,
        }
    }

    pub fn at_time(mut self, time_index: u32) -> Self {
        self.time_index = Some(time_index);
        self
    }

    pub fn at_level(mut self, level_index: u32) -> Self {
        self.level_index = Some(level_index);
        self
    }

    /// Scalar request for one component, sharing geometry and slices.
    pub fn component(&self, url: &str) -> GridRequest {
        GridRequest {
            url: url.to_string(),
            header: self.header,
            time_index: self.time_index,
            level_index: self.level_index,
        }
    }

    pub fn u_component(&self) -> GridRequest {
        self.component(&self.u_url)
    }

    pub fn v_component(&self) -> GridRequest {
        self.component(&self.v_url)
    }
}

impl Fingerprintable for VectorGridRequest {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        RequestValue::try_map([
            ("u_url", RequestValue::from(self.u_url.as_str())),
            ("v_url", self.v_url.as_str().into()),
            ("header", header_value(&self.header)?),
            ("time", self.time_index.into()),
            ("level", self.level_index.into()),
        ])
    }
}

/// Destination raster and the projection parameters that place it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub width: usize,
    pub height: usize,
    /// Projection name understood by the host's projection provider.
    pub projection: String,
    /// Rotation angles (lambda, phi, gamma) in degrees.
    pub rotate: [f64; 3],
    pub scale: f64,
    pub translate: [f64; 2],
}

impl ViewState {
    pub fn new(width: usize, height: usize, projection: impl Into<String>) -> Self {
        Self {
            width,
            height,
            projection: projection.into(),
            rotate: [0.0; 3],
            scale: 1.0,
            translate: [width as f64 / 2.0, height as f64 / 2.0],
        }
    }

    pub fn with_rotation(mut self, rotate: [f64; 3]) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_translation(mut self, translate: [f64; 2]) -> Self {
        self.translate = translate;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl Fingerprintable for ViewState {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        RequestValue::try_map([
            ("size", RequestValue::seq([self.width, self.height])),
            ("projection", self.projection.as_str().into()),
            ("rotate", self.rotate.into()),
            ("scale", self.scale.into()),
            ("translate", self.translate.into()),
        ])
    }
}

/// A scalar grid resampled into a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelFieldRequest {
    pub grid: GridRequest,
    pub view: ViewState,
}

impl PixelFieldRequest {
    pub fn new(grid: GridRequest, view: ViewState) -> Self {
        Self { grid, view }
    }
}

impl Fingerprintable for PixelFieldRequest {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        RequestValue::try_map([
            ("grid", RequestValue::entity(&self.grid)?),
            ("view", RequestValue::entity(&self.view)?),
        ])
    }
}

/// A vector grid resampled into a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPixelFieldRequest {
    pub grid: VectorGridRequest,
    pub view: ViewState,
}

impl VectorPixelFieldRequest {
    pub fn new(grid: VectorGridRequest, view: ViewState) -> Self {
        Self { grid, view }
    }
}

impl Fingerprintable for VectorPixelFieldRequest {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        RequestValue::try_map([
            ("grid", RequestValue::entity(&self.grid)?),
            ("view", RequestValue::entity(&self.view)?),
        ])
    }
}
