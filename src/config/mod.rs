//! Configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_distance_threshold() -> f64 {
    0.5
}

fn default_downsize_ratio_z_axis() -> f64 {
    0.5
}

fn default_publish_debug_map() -> bool {
    false
}

fn default_timer_interval_ms() -> u64 {
    100
}

fn default_map_update_distance_threshold() -> f64 {
    10.0
}

fn default_map_loader_radius() -> f64 {
    150.0
}

fn default_max_map_grid_size() -> f64 {
    100.0
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_wait_slice_ms() -> u64 {
    1000
}

/// Settings for the streaming backend's update cycle and tile service.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Period of the background update timer, in milliseconds.
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,
    /// Ground-plane displacement that triggers a differential request, in
    /// meters.
    #[serde(default = "default_map_update_distance_threshold")]
    pub map_update_distance_threshold: f64,
    /// Radius of the tile neighborhood requested around the agent, in
    /// meters.
    #[serde(default = "default_map_loader_radius")]
    pub map_loader_radius: f64,
    /// Largest tile edge length the loader accepts, in meters.
    #[serde(default = "default_max_map_grid_size")]
    pub max_map_grid_size: f64,
    /// Overall deadline for one differential request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long to wait between availability checks while a request is
    /// pending, in milliseconds.
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            timer_interval_ms: default_timer_interval_ms(),
            map_update_distance_threshold: default_map_update_distance_threshold(),
            map_loader_radius: default_map_loader_radius(),
            max_map_grid_size: default_max_map_grid_size(),
            request_timeout_ms: default_request_timeout_ms(),
            wait_slice_ms: default_wait_slice_ms(),
        }
    }
}

impl StreamingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timer_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice_ms)
    }
}

/// Top-level map loader settings.
///
/// The distance threshold doubles as the horizontal voxel leaf size, so
/// the close-point test degenerates to a stencil of voxel lookups.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MapLoaderConfig {
    /// Query distance threshold and horizontal leaf size, in meters.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    /// Vertical leaf size and vertical threshold, as a fraction of
    /// `distance_threshold`.
    #[serde(default = "default_downsize_ratio_z_axis")]
    pub downsize_ratio_z_axis: f64,
    /// Republish the downsampled map after every rebuild or tile update.
    #[serde(default = "default_publish_debug_map")]
    pub publish_debug_map: bool,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl Default for MapLoaderConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            downsize_ratio_z_axis: default_downsize_ratio_z_axis(),
            publish_debug_map: default_publish_debug_map(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl MapLoaderConfig {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse and validate configuration from a YAML string. Missing fields
    /// take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if !(self.downsize_ratio_z_axis.is_finite()
            && self.downsize_ratio_z_axis > 0.0
            && self.downsize_ratio_z_axis <= 1.0)
        {
            return Err(ConfigError::Invalid(format!(
                "downsize_ratio_z_axis must be in (0, 1], got {}",
                self.downsize_ratio_z_axis
            )));
        }
        if !(self.streaming.map_update_distance_threshold.is_finite()
            && self.streaming.map_update_distance_threshold >= 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "map_update_distance_threshold must be non-negative, got {}",
                self.streaming.map_update_distance_threshold
            )));
        }
        if !(self.streaming.map_loader_radius.is_finite() && self.streaming.map_loader_radius > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "map_loader_radius must be positive, got {}",
                self.streaming.map_loader_radius
            )));
        }
        if !(self.streaming.max_map_grid_size.is_finite() && self.streaming.max_map_grid_size > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "max_map_grid_size must be positive, got {}",
                self.streaming.max_map_grid_size
            )));
        }
        if self.streaming.timer_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timer_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
