//! Configuration for a compute cache instance.

use serde::{Deserialize, Serialize};

/// Default number of settled values kept per cache.
pub const DEFAULT_CAPACITY: usize = 50;

/// Configuration for a single compute cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name used in log fields.
    pub name: String,

    /// Maximum number of settled values kept. Zero disables caching but
    /// keeps request collapsing.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "compute".to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with an explicit name and capacity.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FIELD_CACHE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                config.capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("FIELD_CACHE_NAME") {
            config.name = val;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("cache name must not be empty".to_string());
        }

        Ok(())
    }
}
