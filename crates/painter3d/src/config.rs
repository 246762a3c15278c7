//! Pipeline configuration
//!
//! Settings are plain data deserialized from TOML. Validation happens once
//! at load time so the pipeline can trust every field afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::sort::{SortMode, DEFAULT_BIN_COUNT, DEFAULT_MAX_TRIANGLES};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field value is outside its valid range
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Tunable settings for the render pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of depth buckets used by the sorter
    pub bin_count: usize,
    /// Fixed per-frame triangle capacity
    pub max_triangles: usize,
    /// Triangle ordering handed to the rasterizer
    pub sort_mode: SortMode,
    /// Cull anything whose bounds lie entirely beyond this distance
    pub max_draw_distance: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            max_triangles: DEFAULT_MAX_TRIANGLES,
            sort_mode: SortMode::BackToFront,
            max_draw_distance: None,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bin_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_triangles == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_triangles",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(distance) = self.max_draw_distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "max_draw_distance",
                    reason: format!("must be finite and positive, got {distance}"),
                });
            }
        }
        Ok(())
    }
}
