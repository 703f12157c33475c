//! Error types for grid processing.

use compute_cache::CacheError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug, Clone)]
pub enum GridProcessorError {
    /// The grid header failed validation.
    #[error("invalid grid header: {0}")]
    InvalidHeader(String),

    /// A value array does not match the header's point count.
    #[error("value array has {actual} elements, header expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A visibility mask or raster size is unusable.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// The host decoder failed.
    #[error("failed to decode grid: {0}")]
    DecodeFailed(String),

    /// The host projection collaborator failed.
    #[error("projection error: {0}")]
    ProjectionError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The computation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// The compute cache reported a failure.
    #[error("cache error: {0}")]
    Cache(CacheError),
}

impl GridProcessorError {
    /// Create an InvalidHeader error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Create an InvalidRaster error.
    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }

    /// Create a DecodeFailed error.
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Create a ProjectionError.
    pub fn projection(msg: impl Into<String>) -> Self {
        Self::ProjectionError(msg.into())
    }

    /// True when the operation was abandoned rather than failed.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Cache(err) => err.is_cancelled(),
            _ => false,
        }
    }
}

impl From<CacheError> for GridProcessorError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Cancelled => Self::Cancelled,
            other => Self::Cache(other),
        }
    }
}

impl From<GridProcessorError> for CacheError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::Cancelled => CacheError::Cancelled,
            GridProcessorError::Cache(inner) => inner,
            other => CacheError::failed(other),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
