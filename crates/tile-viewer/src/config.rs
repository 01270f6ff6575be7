use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tile_engine::EngineConfig;

/// `tile_viewer` - headless driver for the tile engine.
///
/// Builds a synthetic grid from a directory of textures, flies a scripted
/// pan/zoom path over it and reports frame timings. The last frame can be
/// written out as a PNG.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory searched recursively for `*.png` textures.
    ///
    /// Each file becomes one texture, identified by its file stem.
    #[arg(long, env = "TILE_TEXTURES")]
    pub textures: PathBuf,

    /// Grid width in cells.
    #[arg(long, env = "TILE_GRID_WIDTH", default_value_t = 256)]
    pub grid_width: usize,

    /// Grid height in cells.
    #[arg(long, env = "TILE_GRID_HEIGHT", default_value_t = 256)]
    pub grid_height: usize,

    /// Number of frames in the scripted flight.
    #[arg(long, env = "TILE_FRAMES", default_value_t = 120)]
    pub frames: u32,

    /// Where to write the final frame as PNG.
    #[arg(long, env = "TILE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Engine settings in TOML. Unset fields keep their defaults.
    #[arg(long, env = "TILE_ENGINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `loader_threads` from the engine settings.
    #[arg(long, env = "TILE_LOADER_THREADS")]
    pub loader_threads: Option<usize>,
}

impl Config {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut engine = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading engine config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(threads) = self.loader_threads {
            engine.loader_threads = threads;
        }
        Ok(engine)
    }
}
