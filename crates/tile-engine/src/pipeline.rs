//! The per-frame collect → ensure resident → draw pipeline.

use std::time::{Duration, Instant};

use glam::{DVec2, Vec2};

use crate::cache::{ResidentTexture, TextureResidencyCache};
use crate::config::{CollectStrategy, EngineConfig};
use crate::culler::{CellRange, ViewportCuller};
use crate::decode::TileDecoder;
use crate::error::DecodeError;
use crate::grid::{Grid, Tile};
use crate::loader::AsyncAssetLoader;
use crate::pool::{ReusableBufferPool, TileSlot, VisibleTileEntry};
use crate::surface::{PixelBuffer, RectStyle, RenderSurface, Rgba, TextureUploader, UploadGate};
use crate::transform::CoordinateTransform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Entries collected in Phase 1.
    pub visible: usize,
    /// Distinct texture ids among them.
    pub distinct: usize,
    /// Ids that were not resident when Phase 2 started.
    pub misses: usize,
    pub resident: usize,
    pub pending: usize,
    pub failed: usize,
    pub draws: usize,
    pub elapsed: Duration,
}

/// Render-thread side of texture residency: turns decoded pixels into cached
/// GPU handles.
pub struct Residency<'a, U: TextureUploader + ?Sized> {
    pub cache: &'a mut TextureResidencyCache,
    pub uploader: &'a mut U,
    pub gate: &'a UploadGate,
    /// Used when no loader is configured.
    pub decoder: &'a dyn TileDecoder,
}

impl<U: TextureUploader + ?Sized> Residency<'_, U> {
    /// Uploads a finished decode and caches the handle. Failures are logged
    /// and leave the cache untouched so the tile is retried on its next miss.
    pub fn admit(&mut self, tile: &Tile, outcome: Result<PixelBuffer, DecodeError>) -> bool {
        let pixels = match outcome {
            Ok(pixels) => pixels,
            Err(err) => {
                log::warn!("Failed to decode texture {}: {}", tile.id, err);
                return false;
            }
        };

        match self.gate.create_handle(&mut *self.uploader, &tile.id, &pixels) {
            Ok(handle) => {
                let texture = ResidentTexture {
                    handle,
                    width: pixels.width,
                    height: pixels.height,
                };
                if let Some(old) = self.cache.insert(tile.id.clone(), texture) {
                    self.uploader.release(old.handle);
                }
                true
            }
            Err(err) => {
                log::warn!("Failed to upload texture {}: {}", tile.id, err);
                false
            }
        }
    }

    /// Decodes on the calling thread and admits the result.
    pub fn load_now(&mut self, tile: &Tile) -> bool {
        let outcome = self.decoder.decode(tile);
        self.admit(tile, outcome)
    }
}

#[derive(Debug)]
pub struct BatchPipeline {
    culler: ViewportCuller,
    strategy: CollectStrategy,
    sort_by_texture: bool,
    placeholder: Rgba,
    pool: ReusableBufferPool,
    range: CellRange,
}

impl BatchPipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            culler: ViewportCuller::new(config.cull_padding),
            strategy: config.collect_strategy,
            sort_by_texture: config.sort_by_texture,
            placeholder: config.placeholder_color,
            pool: ReusableBufferPool::new(),
            range: CellRange::EMPTY,
        }
    }

    pub fn strategy(&self) -> CollectStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: CollectStrategy) {
        self.strategy = strategy;
    }

    pub fn set_sort_by_texture(&mut self, sort: bool) {
        self.sort_by_texture = sort;
    }

    pub fn pool(&self) -> &ReusableBufferPool {
        &self.pool
    }

    /// Entries of the last frame, in draw order once the frame completed.
    pub fn entries(&self) -> &[VisibleTileEntry] {
        self.pool.entries()
    }

    /// Culled range of the last collect.
    pub fn range(&self) -> CellRange {
        self.range
    }

    /// Runs all three phases. Returns `None` when the surface is detached at
    /// entry or before drawing.
    pub fn render<S, U>(
        &mut self,
        grid: &Grid,
        transform: &CoordinateTransform,
        viewport: DVec2,
        surface: &mut S,
        residency: &mut Residency<'_, U>,
        loader: Option<&mut AsyncAssetLoader>,
    ) -> Option<FrameStats>
    where
        S: RenderSurface + ?Sized,
        U: TextureUploader + ?Sized,
    {
        let started = Instant::now();
        if !surface.is_attached() {
            return None;
        }

        let mut stats = FrameStats::default();
        self.collect(grid, transform, viewport);
        self.ensure_resident(grid, residency, loader, &mut stats);

        if !surface.is_attached() {
            return None;
        }
        if self.sort_by_texture {
            self.pool.sort_by_tile();
        }
        self.draw(grid, surface, &mut stats);

        stats.elapsed = started.elapsed();
        log::trace!(
            "Frame: {} visible, {} distinct, {} misses, {} draws in {:?}",
            stats.visible,
            stats.distinct,
            stats.misses,
            stats.draws,
            stats.elapsed
        );
        Some(stats)
    }

    /// Phase 1: fills the pool with every cell whose screen span touches the
    /// viewport, row-major.
    pub fn collect(&mut self, grid: &Grid, transform: &CoordinateTransform, viewport: DVec2) -> CellRange {
        let range = self
            .culler
            .cull(transform, viewport, grid.width(), grid.height());
        self.range = range;
        self.pool.prepare(
            range.cell_count(),
            range.columns(),
            range.rows(),
            grid.palette().len(),
        );
        if range.is_empty() {
            return range;
        }

        match self.strategy {
            CollectStrategy::Batched => self.collect_batched(grid, transform, viewport, range),
            CollectStrategy::Scalar => self.collect_scalar(grid, transform, viewport, range),
        }
        range
    }

    fn collect_batched(
        &mut self,
        grid: &Grid,
        transform: &CoordinateTransform,
        viewport: DVec2,
        range: CellRange,
    ) {
        let scale = transform.scale();
        let size = scale as f32;

        let mut xs = std::mem::take(&mut self.pool.xs);
        let mut ys = std::mem::take(&mut self.pool.ys);
        xs.extend((range.start_x..=range.end_x).map(|x| transform.screen_x(x)));
        ys.extend((range.start_y..=range.end_y).map(|y| transform.screen_y(y)));

        for (j, &sy) in ys.iter().enumerate() {
            if !span_visible(sy, scale, viewport.y) {
                continue;
            }
            let row = &grid.row(range.start_y as usize + j)[range.start_x as usize..];
            for (i, &sx) in xs.iter().enumerate() {
                if !span_visible(sx, scale, viewport.x) {
                    continue;
                }
                self.pool.push(VisibleTileEntry {
                    tile: row[i],
                    screen: Vec2::new(sx as f32, sy as f32),
                    size,
                });
            }
        }

        self.pool.xs = xs;
        self.pool.ys = ys;
    }

    fn collect_scalar(
        &mut self,
        grid: &Grid,
        transform: &CoordinateTransform,
        viewport: DVec2,
        range: CellRange,
    ) {
        let scale = transform.scale();
        let size = scale as f32;

        for y in range.start_y..=range.end_y {
            let sy = transform.screen_y(y);
            if !span_visible(sy, scale, viewport.y) {
                continue;
            }
            let row = grid.row(y as usize);
            for x in range.start_x..=range.end_x {
                let sx = transform.screen_x(x);
                if !span_visible(sx, scale, viewport.x) {
                    continue;
                }
                self.pool.push(VisibleTileEntry {
                    tile: row[x as usize],
                    screen: Vec2::new(sx as f32, sy as f32),
                    size,
                });
            }
        }
    }

    /// Phase 2: every distinct collected texture ends up resident, pending on
    /// the loader, or failed for this frame.
    pub fn ensure_resident<U: TextureUploader + ?Sized>(
        &mut self,
        grid: &Grid,
        residency: &mut Residency<'_, U>,
        mut loader: Option<&mut AsyncAssetLoader>,
        stats: &mut FrameStats,
    ) {
        let pool = &mut self.pool;
        stats.visible = pool.entries.len();
        stats.distinct = pool.distinct.len();

        if let Some(loader) = loader.as_deref_mut() {
            loader.drain_ready(|result| {
                residency.admit(&result.tile, result.outcome);
            });
        }

        pool.misses.clear();
        for &idx in &pool.distinct {
            match residency.cache.get(&grid.tile(idx).id) {
                Some(texture) => pool.slots[idx as usize] = TileSlot::Resident(texture.handle),
                None => pool.misses.push(idx),
            }
        }
        stats.misses = pool.misses.len();

        if !pool.misses.is_empty() {
            match loader.as_deref_mut() {
                Some(loader) => {
                    loader.submit(pool.misses.iter().map(|&idx| grid.tile(idx)));
                    pool.wanted.clear();
                    pool.wanted
                        .extend(pool.misses.iter().map(|&idx| grid.tile(idx).id.clone()));
                    loader.join(&pool.wanted, |result| {
                        residency.admit(&result.tile, result.outcome);
                    });
                }
                None => {
                    for &idx in &pool.misses {
                        residency.load_now(grid.tile(idx));
                    }
                }
            }

            for &idx in &pool.misses {
                let id = &grid.tile(idx).id;
                pool.slots[idx as usize] = match residency.cache.get(id) {
                    Some(texture) => TileSlot::Resident(texture.handle),
                    None if loader.as_deref().is_some_and(|l| l.is_in_flight(id)) => TileSlot::Pending,
                    None => TileSlot::Failed,
                };
            }
        }

        for &idx in &pool.distinct {
            match pool.slots[idx as usize] {
                TileSlot::Resident(_) => stats.resident += 1,
                TileSlot::Pending => stats.pending += 1,
                TileSlot::Failed => stats.failed += 1,
                TileSlot::Unseen | TileSlot::Wanted => {}
            }
        }
    }

    /// Phase 3: clears the surface and issues one draw per entry in pool
    /// order. Pending and failed tiles get a filled placeholder.
    ///
    /// Panics if an entry's texture was never resolved by Phase 2.
    pub fn draw<S: RenderSurface + ?Sized>(&mut self, grid: &Grid, surface: &mut S, stats: &mut FrameStats) {
        surface.clear();

        for entry in &self.pool.entries {
            let min = entry.screen;
            let max = min + Vec2::splat(entry.size);
            match self.pool.slots[entry.tile as usize] {
                TileSlot::Resident(handle) => {
                    surface.draw_image(handle, min, max);
                }
                TileSlot::Pending | TileSlot::Failed => {
                    let color = grid
                        .tile(entry.tile)
                        .fallback_color
                        .map(Rgba::opaque)
                        .unwrap_or(self.placeholder);
                    surface.draw_rect(min, max, RectStyle::fill(color));
                }
                slot @ (TileSlot::Unseen | TileSlot::Wanted) => panic!(
                    "texture {} reached the draw phase unresolved ({:?})",
                    grid.tile(entry.tile).id,
                    slot
                ),
            }
            stats.draws += 1;
        }
    }
}

/// Whether `[start, start + size]` intersects `[0, limit]`, boundaries included.
#[inline]
fn span_visible(start: f64, size: f64, limit: f64) -> bool {
    start >= -size && start <= limit
}
