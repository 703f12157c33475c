//! The field pipeline: decoded grids, visibility masks and reprojected pixel
//! fields, each behind its own compute cache.
//!
//! ```text
//! pixel_field(grid, view)
//!      │
//!      ├─► grid cache ──► GridDecoder::decode ──► ScalarGrid
//!      │
//!      ├─► mask cache ──► ProjectionProvider::visibility ──► VisibilityMask
//!      │
//!      └─► Reprojector::reproject(grid, inverse, mask) ──► PixelField
//! ```
//!
//! A pixel-field computation reaches the grid and mask caches through
//! consumers of its own, so cancelling it releases whatever it was waiting on.

use std::future::Future;
use std::sync::Arc;

use compute_cache::{CacheConfig, CacheError, CacheStats, CancellationToken, ComputeCache, ConsumerHandle};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::decode::{load_scalar_grid, load_vector_grid, GridDecoder};
use crate::error::{GridProcessorError, Result};
use crate::grid::{FieldSampler, ScalarGrid, VectorGrid};
use crate::projection::{InverseProjection, Reprojector, VisibilityMask};
use crate::request::{GridRequest, PixelFieldRequest, VectorGridRequest, VectorPixelFieldRequest, ViewState};
use crate::types::PixelField;

/// Host-side projection collaborator for a view.
pub trait ProjectionProvider: Send + Sync {
    /// Pixel to source-coordinate inversion for `view`.
    fn inverse(&self, view: &ViewState) -> Result<Arc<dyn InverseProjection>>;

    /// Which pixels of `view` show the globe.
    fn visibility(&self, view: &ViewState) -> Result<VisibilityMask>;
}

type GridCache = ComputeCache<GridRequest, Arc<ScalarGrid>>;
type VectorGridCache = ComputeCache<VectorGridRequest, Arc<VectorGrid>>;
type MaskCache = ComputeCache<ViewState, Arc<VisibilityMask>>;
type PixelCache = ComputeCache<PixelFieldRequest, Arc<PixelField<f32>>>;
type VectorPixelCache = ComputeCache<VectorPixelFieldRequest, Arc<PixelField<[f32; 2]>>>;

/// Statistics for every cache in the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub grids: CacheStats,
    pub vector_grids: CacheStats,
    pub masks: CacheStats,
    pub pixel_fields: CacheStats,
    pub vector_pixel_fields: CacheStats,
}

/// Owner of the grid, mask and pixel-field caches.
///
/// Cloning is cheap; clones share every cache.
#[derive(Debug, Clone)]
pub struct FieldPipeline {
    config: PipelineConfig,
    grids: GridCache,
    vector_grids: VectorGridCache,
    masks: MaskCache,
    pixel_fields: PixelCache,
    vector_pixel_fields: VectorPixelCache,
}

impl FieldPipeline {
    /// Build the pipeline around host collaborators.
    pub fn new(
        config: PipelineConfig,
        decoder: Arc<dyn GridDecoder>,
        projections: Arc<dyn ProjectionProvider>,
    ) -> Result<Self> {
        config.validate().map_err(GridProcessorError::ConfigError)?;
        let reprojector = Reprojector::new(config.interpolation, config.yield_budget());

        let grids = {
            let decoder = Arc::clone(&decoder);
            ComputeCache::new(
                CacheConfig::new("grids", config.grid_cache_size),
                move |request: GridRequest, token: CancellationToken| {
                    let decoder = Arc::clone(&decoder);
                    async move {
                        let grid = load_scalar_grid(decoder.as_ref(), &request, &token).await?;
                        Ok::<_, CacheError>(Arc::new(grid))
                    }
                },
            )
        };

        let vector_grids = ComputeCache::new(
            CacheConfig::new("vector_grids", config.grid_cache_size),
            move |request: VectorGridRequest, token: CancellationToken| {
                let decoder = Arc::clone(&decoder);
                async move {
                    let grid = load_vector_grid(decoder.as_ref(), &request, &token).await?;
                    Ok::<_, CacheError>(Arc::new(grid))
                }
            },
        );

        let masks = {
            let projections = Arc::clone(&projections);
            ComputeCache::new(
                CacheConfig::new("masks", config.mask_cache_size),
                move |view: ViewState, token: CancellationToken| {
                    let projections = Arc::clone(&projections);
                    async move {
                        if token.is_cancelled() {
                            return Err(CacheError::Cancelled);
                        }
                        let mask = projections.visibility(&view)?;
                        debug!(
                            width = view.width,
                            height = view.height,
                            visible = mask.visible_count(),
                            "built visibility mask"
                        );
                        Ok(Arc::new(mask))
                    }
                },
            )
        };

        let pixel_fields = {
            let (grids, masks, projections) = (grids.clone(), masks.clone(), Arc::clone(&projections));
            ComputeCache::new(
                CacheConfig::new("pixel_fields", config.pixel_cache_size),
                move |request: PixelFieldRequest, token: CancellationToken| {
                    let grid = grids.consumer().get_owned(request.grid.clone());
                    let mask = masks.consumer().get_owned(request.view.clone());
                    let projections = Arc::clone(&projections);
                    async move {
                        let field =
                            resample(grid, mask, projections.as_ref(), &request.view, reprojector, &token).await?;
                        Ok::<_, CacheError>(Arc::new(field))
                    }
                },
            )
        };

        let vector_pixel_fields = {
            let (grids, masks) = (vector_grids.clone(), masks.clone());
            ComputeCache::new(
                CacheConfig::new("vector_pixel_fields", config.pixel_cache_size),
                move |request: VectorPixelFieldRequest, token: CancellationToken| {
                    let grid = grids.consumer().get_owned(request.grid.clone());
                    let mask = masks.consumer().get_owned(request.view.clone());
                    let projections = Arc::clone(&projections);
                    async move {
                        let field =
                            resample(grid, mask, projections.as_ref(), &request.view, reprojector, &token).await?;
                        Ok::<_, CacheError>(Arc::new(field))
                    }
                },
            )
        };

        info!(
            grid_cache_size = config.grid_cache_size,
            mask_cache_size = config.mask_cache_size,
            pixel_cache_size = config.pixel_cache_size,
            yield_budget_ms = config.yield_budget_ms,
            interpolation = %config.interpolation,
            "field pipeline created"
        );

        Ok(Self {
            config,
            grids,
            vector_grids,
            masks,
            pixel_fields,
            vector_pixel_fields,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Register a consumer, typically one per interactive view.
    pub fn consumer(&self) -> PipelineConsumer {
        PipelineConsumer {
            grids: self.grids.consumer(),
            vector_grids: self.vector_grids.consumer(),
            masks: self.masks.consumer(),
            pixel_fields: self.pixel_fields.consumer(),
            vector_pixel_fields: self.vector_pixel_fields.consumer(),
        }
    }

    pub fn grid_cache(&self) -> &ComputeCache<GridRequest, Arc<ScalarGrid>> {
        &self.grids
    }

    pub fn mask_cache(&self) -> &ComputeCache<ViewState, Arc<VisibilityMask>> {
        &self.masks
    }

    pub fn pixel_cache(&self) -> &ComputeCache<PixelFieldRequest, Arc<PixelField<f32>>> {
        &self.pixel_fields
    }

    /// Drop every settled value. In-flight work is unaffected.
    pub fn clear(&self) {
        self.grids.clear();
        self.vector_grids.clear();
        self.masks.clear();
        self.pixel_fields.clear();
        self.vector_pixel_fields.clear();
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            grids: self.grids.stats(),
            vector_grids: self.vector_grids.stats(),
            masks: self.masks.stats(),
            pixel_fields: self.pixel_fields.stats(),
            vector_pixel_fields: self.vector_pixel_fields.stats(),
        }
    }
}

/// Wait for a grid and a mask, then reproject. Cancellation of `token` drops
/// both waits, releasing the upstream requests.
async fn resample<S>(
    grid: impl Future<Output = compute_cache::Result<Arc<S>>>,
    mask: impl Future<Output = compute_cache::Result<Arc<VisibilityMask>>>,
    projections: &dyn ProjectionProvider,
    view: &ViewState,
    reprojector: Reprojector,
    token: &CancellationToken,
) -> Result<PixelField<S::Value>>
where
    S: FieldSampler,
{
    let (grid, mask) = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(GridProcessorError::Cancelled),
        inputs = futures::future::try_join(grid, mask) => inputs?,
    };
    let inverse = projections.inverse(view)?;
    reprojector
        .reproject(view.width, view.height, grid.as_ref(), inverse.as_ref(), mask.as_ref(), token)
        .await
}

/// One caller's view onto the pipeline.
///
/// Each request kind has its own cancellation slot: a new pixel-field request
/// supersedes this consumer's previous pixel-field request, but leaves its
/// grid and mask requests alone.
#[derive(Debug)]
pub struct PipelineConsumer {
    grids: ConsumerHandle<GridRequest, Arc<ScalarGrid>>,
    vector_grids: ConsumerHandle<VectorGridRequest, Arc<VectorGrid>>,
    masks: ConsumerHandle<ViewState, Arc<VisibilityMask>>,
    pixel_fields: ConsumerHandle<PixelFieldRequest, Arc<PixelField<f32>>>,
    vector_pixel_fields: ConsumerHandle<VectorPixelFieldRequest, Arc<PixelField<[f32; 2]>>>,
}

impl PipelineConsumer {
    pub fn grid(&self, request: GridRequest) -> impl Future<Output = Result<Arc<ScalarGrid>>> + Send + 'static {
        let wait = self.grids.get(request);
        async move { wait.await.map_err(GridProcessorError::from) }
    }

    pub fn vector_grid(
        &self,
        request: VectorGridRequest,
    ) -> impl Future<Output = Result<Arc<VectorGrid>>> + Send + 'static {
        let wait = self.vector_grids.get(request);
        async move { wait.await.map_err(GridProcessorError::from) }
    }

    pub fn mask(&self, view: ViewState) -> impl Future<Output = Result<Arc<VisibilityMask>>> + Send + 'static {
        let wait = self.masks.get(view);
        async move { wait.await.map_err(GridProcessorError::from) }
    }

    /// Reproject a scalar grid into `view`.
    pub fn pixel_field(
        &self,
        grid: GridRequest,
        view: ViewState,
    ) -> impl Future<Output = Result<Arc<PixelField<f32>>>> + Send + 'static {
        let wait = self.pixel_fields.get(PixelFieldRequest::new(grid, view));
        async move { wait.await.map_err(GridProcessorError::from) }
    }

    /// Reproject a vector grid into `view`.
    pub fn vector_pixel_field(
        &self,
        grid: VectorGridRequest,
        view: ViewState,
    ) -> impl Future<Output = Result<Arc<PixelField<[f32; 2]>>>> + Send + 'static {
        let wait = self.vector_pixel_fields.get(VectorPixelFieldRequest::new(grid, view));
        async move { wait.await.map_err(GridProcessorError::from) }
    }

    /// Abandon every in-flight request of this consumer.
    pub fn cancel(&self) {
        self.grids.cancel();
        self.vector_grids.cancel();
        self.masks.cancel();
        self.pixel_fields.cancel();
        self.vector_pixel_fields.cancel();
    }

    pub fn has_pending(&self) -> bool {
        self.grids.has_pending()
            || self.vector_grids.has_pending()
            || self.masks.has_pending()
            || self.pixel_fields.has_pending()
            || self.vector_pixel_fields.has_pending()
    }
}
