//! Regular-grid fields and their reprojection onto projected rasters.
//!
//! This crate samples gridded geophysical data (temperature, wind, ...) and
//! resamples it into the pixels of a map view. It provides:
//!
//! - **Grid fields**: scalar and vector grids with nearest and bilinear
//!   sampling, periodic longitude wrap and NaN-propagating missing data
//! - **Reprojection**: per-pixel inversion through a host projection, with a
//!   visibility mask and time-boxed cooperative yielding
//! - **Field pipeline**: grids, masks and pixel fields memoized in
//!   [`compute_cache`] caches with per-consumer cancellation
//!
//! # Architecture
//!
//! ```text
//! PipelineConsumer::pixel_field(grid, view)
//!      │
//!      ▼
//! pixel cache ── hit ──► Arc<PixelField>
//!      │
//!      └─ miss ─► grid cache ──► GridDecoder (scale/offset, fill → NaN)
//!                 mask cache ──► ProjectionProvider::visibility
//!                      │
//!                      ▼
//!                 Reprojector: for each row
//!                      ├─► mask? ─► invert(px, py) ─► sample(x, y)
//!                      └─► yield after 16 ms, check cancellation
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{FieldPipeline, GridHeader, GridRequest, PipelineConfig, ViewState};
//!
//! let pipeline = FieldPipeline::new(PipelineConfig::from_env(), decoder, projections)?;
//! let view = pipeline.consumer();
//!
//! let header = GridHeader::geographic(0.0, 0.25, 1440, 90.0, -0.25, 721);
//! let field = view
//!     .pixel_field(GridRequest::new("gfs/t2m", header), ViewState::new(800, 600, "orthographic"))
//!     .await?;
//! ```

pub mod config;
pub mod cooperative;
pub mod decode;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod projection;
pub mod request;
pub mod types;

// Re-export commonly used types at crate root
pub use config::PipelineConfig;
pub use cooperative::CooperativeBudget;
pub use decode::{load_scalar_grid, load_vector_grid, DecodedArray, GridDecoder};
pub use error::{GridProcessorError, Result};
pub use grid::{FieldSampler, ScalarGrid, VectorGrid};
pub use pipeline::{FieldPipeline, PipelineConsumer, PipelineStats, ProjectionProvider};
pub use projection::{InverseProjection, Reprojector, Visibility, VisibilityMask};
pub use request::{GridRequest, PixelFieldRequest, VectorGridRequest, VectorPixelFieldRequest, ViewState};
pub use types::{align_longitude, FieldValue, GridHeader, InterpolationMethod, PixelField};
