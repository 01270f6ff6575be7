//! Engine settings, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;
use crate::surface::Rgba;

/// How Phase 1 walks the culled range. Both make identical decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectStrategy {
    /// Per-row and per-column screen coordinates are computed into pooled
    /// arrays first, then masked.
    #[default]
    Batched,
    /// Coordinates are computed inline while iterating.
    Scalar,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Native texture edge in pixels.
    pub tile_size: f64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Pixels added on every side of the viewport before culling.
    pub cull_padding: f64,
    /// Textures prefetched when a grid is loaded.
    pub preload_cap: usize,
    /// Decode workers; 0 decodes synchronously on the render thread.
    pub loader_threads: usize,
    pub result_timeout_ms: u64,
    pub hover_interval_ms: u64,
    pub sort_by_texture: bool,
    pub collect_strategy: CollectStrategy,
    pub show_grid: bool,
    /// Grid lines are hidden below this zoom.
    pub grid_min_zoom: f64,
    pub grid_color: Rgba,
    pub hover_color: Rgba,
    pub placeholder_color: Rgba,
    /// Total margin (both sides) left by zoom-to-fit.
    pub fit_margin: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: 16.0,
            viewport_width: 800,
            viewport_height: 600,
            min_zoom: 0.1,
            max_zoom: 32.0,
            cull_padding: 50.0,
            preload_cap: 50,
            loader_threads: 4,
            result_timeout_ms: 100,
            hover_interval_ms: 50,
            sort_by_texture: true,
            collect_strategy: CollectStrategy::Batched,
            show_grid: true,
            grid_min_zoom: 0.5,
            grid_color: Rgba([100, 100, 100, 128]),
            hover_color: Rgba([255, 255, 255, 200]),
            placeholder_color: Rgba([255, 0, 255, 255]),
            fit_margin: 40.0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));

        if !(self.tile_size > 0.0) {
            return fail("tile_size must be positive");
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return fail("viewport dimensions must be non-zero");
        }
        if !(self.min_zoom > 0.0) {
            return fail("min_zoom must be positive");
        }
        if self.min_zoom > self.max_zoom {
            return fail("min_zoom must not exceed max_zoom");
        }
        if !(self.cull_padding >= 0.0) {
            return fail("cull_padding must not be negative");
        }
        Ok(())
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn hover_interval(&self) -> Duration {
        Duration::from_millis(self.hover_interval_ms)
    }
}
