//! Entry point for the headless tile viewer.

mod app;
mod config;

use anyhow::Result;
use clap::Parser;

use crate::app::App;
use crate::config::Config;

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!("Viewer starting with {:?}", config);

    let engine_config = config.engine_config()?;
    let tiles = app::load_textures(&config.textures)?;
    let grid = app::synthetic_grid(&tiles, config.grid_width, config.grid_height)?;

    let mut app = App::new(engine_config)?;
    app.set_grid(grid);
    app.fly(config.frames);

    let info = app.engine().info();
    log::info!(
        "Final view: {}x{} cells at zoom {:.3}, pan ({:.1}, {:.1})",
        info.grid_width,
        info.grid_height,
        info.zoom,
        info.pan.x,
        info.pan.y
    );

    if let Some(output) = &config.output {
        app.snapshot(output)?;
    }
    Ok(())
}
