use anyhow::{bail, Context, Result};
use glam::DVec2;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tile_engine::raster::{RasterSurface, RasterUploader};
use tile_engine::{EngineConfig, FrameStats, Grid, ImageDecoder, Tile, TileEngine};
use walkdir::WalkDir;

/// Collects every `*.png` under `root`, sorted by path, as tiles whose id is
/// the file stem. Average colours are computed in parallel and become the
/// placeholder colour of each tile.
pub fn load_textures(root: &Path) -> Result<Vec<Arc<Tile>>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("png"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no .png textures found in '{}'", root.display());
    }
    log::info!("Found {} textures in {}", paths.len(), root.display());

    let tiles = paths
        .par_iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let tile = Tile::new(stem, path);
            Some(Arc::new(match average_color(path) {
                Ok(rgb) => tile.with_fallback_color(rgb),
                Err(err) => {
                    log::warn!("No average colour for {}: {:#}", path.display(), err);
                    tile
                }
            }))
        })
        .collect();
    Ok(tiles)
}

fn average_color(path: &Path) -> Result<[u8; 3]> {
    let img = image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .into_rgb8();
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let mut sum = [0u64; 3];
    for px in img.pixels() {
        for c in 0..3 {
            sum[c] += px.0[c] as u64;
        }
    }
    Ok(sum.map(|s| (s / count) as u8))
}

/// A `width × height` grid cycling through `tiles` along the diagonals.
pub fn synthetic_grid(tiles: &[Arc<Tile>], width: usize, height: usize) -> Result<Grid> {
    if tiles.is_empty() {
        bail!("cannot build a grid without textures");
    }
    let cells = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| Arc::clone(&tiles[(x + y) % tiles.len()]))
        .collect();
    Ok(Grid::new(width, height, cells)?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightReport {
    pub frames: u32,
    pub average: Duration,
    pub max: Duration,
    pub misses: usize,
    pub failed: usize,
}

pub struct App {
    engine: TileEngine<RasterSurface, RasterUploader>,
}

impl App {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let surface = RasterSurface::new(config.viewport_width, config.viewport_height);
        let uploader = surface.uploader();
        let engine = TileEngine::new(config, surface, uploader, Arc::new(ImageDecoder))?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &TileEngine<RasterSurface, RasterUploader> {
        &self.engine
    }

    pub fn set_grid(&mut self, grid: Grid) {
        self.engine.set_grid(grid);
        self.engine.zoom_to_fit();
    }

    /// Flies `frames` frames: zoom in towards the centre, drag across the
    /// grid while hovering, then zoom back out.
    pub fn fly(&mut self, frames: u32) -> FlightReport {
        let viewport = self.engine.viewport();
        let centre = viewport / 2.0;
        let third = (frames / 3).max(1);

        let mut report = FlightReport::default();
        let mut total = Duration::ZERO;
        let mut record = |stats: Option<FrameStats>, report: &mut FlightReport| {
            if let Some(stats) = stats {
                report.frames += 1;
                report.max = report.max.max(stats.elapsed);
                report.misses += stats.misses;
                report.failed += stats.failed;
                total += stats.elapsed;
            }
        };

        for i in 0..frames {
            let stats = if i < third {
                self.engine.zoom_in()
            } else if i < 2 * third {
                if i == third {
                    self.engine.start_pan(centre.x, centre.y);
                }
                let step = (i - third + 1) as f64;
                let pointer = centre - DVec2::new(step * 6.0, step * 3.0);
                self.engine.hover_at(pointer.x, pointer.y);
                self.engine.update_pan(pointer.x, pointer.y)
            } else {
                if i == 2 * third {
                    self.engine.stop_pan();
                }
                self.engine.zoom_out()
            };
            // Zoom clamped at a limit: draw the frame anyway so timings stay comparable.
            let stats = stats.or_else(|| self.engine.render());
            record(stats, &mut report);
        }
        self.engine.force_stop_pan();

        if report.frames > 0 {
            report.average = total / report.frames;
        }
        log::info!(
            "Flew {} frames: avg {:?}, max {:?}, {} misses, {} failed, {} textures resident",
            report.frames,
            report.average,
            report.max,
            report.misses,
            report.failed,
            self.engine.cache().len()
        );
        report
    }

    /// Writes the current surface contents as PNG.
    pub fn snapshot(&self, path: &Path) -> Result<()> {
        self.engine
            .surface()
            .rasterize()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}
