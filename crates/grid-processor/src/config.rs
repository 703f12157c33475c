//! Configuration for the field pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::InterpolationMethod;

/// Configuration for the field pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Decoded grids kept (scalar and vector caches each).
    pub grid_cache_size: usize,

    /// Visibility masks kept. One per view is usually enough.
    pub mask_cache_size: usize,

    /// Reprojected pixel fields kept (scalar and vector caches each).
    pub pixel_cache_size: usize,

    /// Time slice a reprojection may run before yielding, in milliseconds.
    pub yield_budget_ms: u64,

    /// Interpolation method for reprojection.
    pub interpolation: InterpolationMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_cache_size: 50,
            mask_cache_size: 1,
            pixel_cache_size: 50,
            yield_budget_ms: 16,
            interpolation: InterpolationMethod::Bilinear,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.grid_cache_size = size;
            }
        }

        if let Ok(val) = std::env::var("MASK_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.mask_cache_size = size;
            }
        }

        if let Ok(val) = std::env::var("PIXEL_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.pixel_cache_size = size;
            }
        }

        if let Ok(val) = std::env::var("REPROJECT_YIELD_BUDGET_MS") {
            if let Ok(ms) = val.parse() {
                config.yield_budget_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("GRID_INTERPOLATION") {
            config.interpolation = InterpolationMethod::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.yield_budget_ms == 0 {
            return Err("yield_budget_ms must be > 0".to_string());
        }

        if self.yield_budget_ms > 1000 {
            return Err("yield_budget_ms must be <= 1000".to_string());
        }

        Ok(())
    }

    pub fn yield_budget(&self) -> Duration {
        Duration::from_millis(self.yield_budget_ms)
    }
}
