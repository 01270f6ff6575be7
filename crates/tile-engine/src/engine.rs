//! The engine facade tying view state, the render pipeline, texture residency
//! and overlays together on one render thread.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use glam::{DVec2, Vec2};

use crate::cache::TextureResidencyCache;
use crate::config::EngineConfig;
use crate::controller::{PanZoomController, ZoomDirection};
use crate::decode::TileDecoder;
use crate::error::EngineError;
use crate::grid::{Grid, TextureId, Tile};
use crate::loader::AsyncAssetLoader;
use crate::overlay::{grid_line_primitives, OverlayManager, OverlayPrimitive, OverlayRole};
use crate::pipeline::{BatchPipeline, FrameStats, Residency};
use crate::pool::VisibleTileEntry;
use crate::surface::{RectStyle, RenderSurface, TextureUploader, UploadGate};
use crate::transform::ViewState;

/// Snapshot of the engine for status displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineInfo {
    pub grid_width: usize,
    pub grid_height: usize,
    pub zoom: f64,
    pub pan: DVec2,
    pub show_grid: bool,
    pub cell_count: usize,
}

pub struct TileEngine<S: RenderSurface, U: TextureUploader> {
    config: EngineConfig,
    surface: S,
    uploader: U,
    decoder: Arc<dyn TileDecoder>,
    loader: Option<AsyncAssetLoader>,
    gate: UploadGate,
    cache: TextureResidencyCache,
    grid: Grid,
    controller: PanZoomController,
    pipeline: BatchPipeline,
    overlay: OverlayManager,
    viewport: DVec2,
    show_grid: bool,
    hovered: Option<(i64, i64)>,
    hover_dirty: bool,
    frames: u64,
    last_stats: FrameStats,
}

impl<S: RenderSurface, U: TextureUploader> TileEngine<S, U> {
    pub fn new(
        config: EngineConfig,
        surface: S,
        uploader: U,
        decoder: Arc<dyn TileDecoder>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let loader = match config.loader_threads {
            0 => None,
            threads => Some(AsyncAssetLoader::new(
                threads,
                Arc::clone(&decoder),
                config.result_timeout(),
            )?),
        };

        Ok(Self {
            controller: PanZoomController::new(config.tile_size, config.min_zoom, config.max_zoom),
            pipeline: BatchPipeline::new(&config),
            overlay: OverlayManager::new(config.hover_interval()),
            viewport: DVec2::new(config.viewport_width as f64, config.viewport_height as f64),
            show_grid: config.show_grid,
            surface,
            uploader,
            decoder,
            loader,
            gate: UploadGate::new(),
            cache: TextureResidencyCache::new(),
            grid: Grid::empty(),
            hovered: None,
            hover_dirty: false,
            frames: 0,
            last_stats: FrameStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn view(&self) -> &ViewState {
        self.controller.view()
    }

    pub fn cache(&self) -> &TextureResidencyCache {
        &self.cache
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    pub fn loader(&self) -> Option<&AsyncAssetLoader> {
        self.loader.as_ref()
    }

    /// Entries of the last frame in draw order.
    pub fn visible_entries(&self) -> &[VisibleTileEntry] {
        self.pipeline.entries()
    }

    /// Frames that actually reached the surface.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn viewport(&self) -> DVec2 {
        self.viewport
    }

    pub fn is_panning(&self) -> bool {
        self.controller.is_panning()
    }

    pub fn hovered_cell(&self) -> Option<(i64, i64)> {
        self.hovered
    }

    // Rendering

    /// Draws one full frame: tiles, then grid lines, then the hover layer.
    ///
    /// Returns `None` when the surface is detached.
    pub fn render(&mut self) -> Option<FrameStats> {
        let transform = self.controller.transform();
        let mut residency = Residency {
            cache: &mut self.cache,
            uploader: &mut self.uploader,
            gate: &self.gate,
            decoder: &*self.decoder,
        };
        let stats = self.pipeline.render(
            &self.grid,
            &transform,
            self.viewport,
            &mut self.surface,
            &mut residency,
            self.loader.as_mut(),
        )?;

        // The pipeline cleared the surface, overlay items included.
        self.overlay.forget_all();
        self.frames += 1;
        self.last_stats = stats;

        let range = self.pipeline.range();
        if self.show_grid && self.controller.zoom() >= self.config.grid_min_zoom && !range.is_empty() {
            let pan = transform.pan();
            let lines = grid_line_primitives(
                (range.start_x, range.start_y),
                (range.end_x, range.end_y),
                transform.scale(),
                (pan.x, pan.y),
                self.config.grid_color,
            );
            self.overlay.update(OverlayRole::GridLines, lines, &mut self.surface);
        }

        // The clear took the highlight with it; redraw it outside the throttle.
        if self.controller.is_panning() {
            self.hover_dirty = true;
        } else {
            self.draw_hover();
        }
        Some(stats)
    }

    /// Replaces the grid, preloads its first distinct textures and renders.
    /// Returns how many textures the preload made resident.
    pub fn set_grid(&mut self, grid: Grid) -> usize {
        self.grid = grid;
        let preloaded = self.preload();

        log::info!(
            "Loaded {}x{} grid with {} distinct textures ({} preloaded)",
            self.grid.width(),
            self.grid.height(),
            self.grid.palette().len(),
            preloaded
        );

        self.render();
        preloaded
    }

    /// Makes the first `preload_cap` distinct textures, in order of first
    /// appearance, resident before the first frame. Waits at most one result
    /// timeout per result.
    fn preload(&mut self) -> usize {
        let cap = self.config.preload_cap;
        let batch: Vec<&Arc<Tile>> = self
            .grid
            .distinct_in_order()
            .iter()
            .take(cap)
            .map(|&idx| self.grid.tile(idx))
            .filter(|tile| !self.cache.contains(&tile.id))
            .collect();
        if batch.is_empty() {
            return 0;
        }

        let mut residency = Residency {
            cache: &mut self.cache,
            uploader: &mut self.uploader,
            gate: &self.gate,
            decoder: &*self.decoder,
        };

        let admitted = match self.loader.as_mut() {
            Some(loader) => {
                loader.submit(batch.iter().copied());
                let wanted: HashSet<TextureId> = batch.iter().map(|tile| tile.id.clone()).collect();
                let mut admitted = 0;
                let summary = loader.join(&wanted, |result| {
                    if residency.admit(&result.tile, result.outcome) {
                        admitted += 1;
                    }
                });
                if summary.timed_out() {
                    log::debug!(
                        "Preload left {} textures to load on demand",
                        summary.outstanding
                    );
                }
                admitted
            }
            None => batch
                .iter()
                .filter(|tile| residency.load_now(tile))
                .count(),
        };

        log::debug!("Preloaded {}/{} textures", admitted, batch.len());
        admitted
    }

    /// Releases every cached texture and renders again.
    pub fn clear_cache(&mut self) -> Option<FrameStats> {
        self.cache.teardown(&mut self.uploader);
        self.render()
    }

    /// Releases every GPU handle the engine owns.
    pub fn teardown(&mut self) {
        self.cache.teardown(&mut self.uploader);
    }

    /// Resizes the viewport and the surface, then renders.
    pub fn resize(&mut self, width: u32, height: u32) -> Option<FrameStats> {
        self.viewport = DVec2::new(width as f64, height as f64);
        self.surface.resize(width, height);
        self.render()
    }

    // View

    pub fn pan(&mut self, dx: f64, dy: f64) -> Option<FrameStats> {
        if !self.controller.pan_by(DVec2::new(dx, dy)) {
            return None;
        }
        self.render()
    }

    /// Sets the zoom, keeping the grid point under `focus` (default: the
    /// viewport centre) in place. Renders only if the zoom changed.
    pub fn set_zoom(&mut self, zoom: f64, focus: Option<DVec2>) -> Option<FrameStats> {
        let focus = focus.unwrap_or(self.viewport / 2.0);
        if !self.controller.set_zoom(zoom, focus) {
            return None;
        }
        self.render()
    }

    pub fn zoom_in(&mut self) -> Option<FrameStats> {
        self.zoom_step(ZoomDirection::In)
    }

    pub fn zoom_out(&mut self) -> Option<FrameStats> {
        self.zoom_step(ZoomDirection::Out)
    }

    fn zoom_step(&mut self, direction: ZoomDirection) -> Option<FrameStats> {
        if !self.controller.zoom_step(direction, self.viewport / 2.0) {
            return None;
        }
        self.render()
    }

    pub fn zoom_to_fit(&mut self) -> Option<FrameStats> {
        let fitted = self.controller.zoom_to_fit(
            self.grid.width(),
            self.grid.height(),
            self.viewport,
            self.config.fit_margin,
        );
        if !fitted {
            return None;
        }
        self.render()
    }

    pub fn reset_view(&mut self) -> Option<FrameStats> {
        self.controller.reset();
        self.render()
    }

    pub fn start_pan(&mut self, pointer_x: f64, pointer_y: f64) {
        self.controller.start_pan(DVec2::new(pointer_x, pointer_y));
    }

    pub fn update_pan(&mut self, pointer_x: f64, pointer_y: f64) -> Option<FrameStats> {
        if !self.controller.update_pan(DVec2::new(pointer_x, pointer_y)) {
            return None;
        }
        self.render()
    }

    /// Ends a drag. Renders once if a drag was active, otherwise does nothing.
    pub fn stop_pan(&mut self) -> Option<FrameStats> {
        if !self.controller.stop_pan() {
            return None;
        }
        self.render()
    }

    /// Clears a possibly stuck drag and always renders.
    pub fn force_stop_pan(&mut self) -> Option<FrameStats> {
        self.controller.force_stop_pan();
        self.render()
    }

    // Overlays and queries

    pub fn set_grid_overlay_visible(&mut self, visible: bool) -> Option<FrameStats> {
        self.show_grid = visible;
        self.render()
    }

    pub fn is_grid_overlay_visible(&self) -> bool {
        self.show_grid
    }

    /// Moves the hover highlight to cell `(cx, cy)`. Returns whether the hover
    /// layer was redrawn. A move rejected by the throttle stays pending until
    /// [`flush_hover`](Self::flush_hover) or the next render.
    pub fn update_hover(&mut self, cx: i64, cy: i64) -> bool {
        self.update_hover_at(cx, cy, Instant::now())
    }

    /// [`update_hover`](Self::update_hover) with an explicit clock reading.
    pub fn update_hover_at(&mut self, cx: i64, cy: i64, now: Instant) -> bool {
        if self.hovered == Some((cx, cy)) && !self.hover_dirty {
            return false;
        }
        self.hovered = Some((cx, cy));
        self.hover_dirty = true;
        self.flush_hover(now)
    }

    /// Draws a hover move the throttle held back, once the interval has
    /// passed. Hosts call this from their tick.
    pub fn flush_hover(&mut self, now: Instant) -> bool {
        if !self.hover_dirty || self.controller.is_panning() || !self.overlay.accept_hover(now) {
            return false;
        }
        self.draw_hover()
    }

    /// Hover from a pointer position in surface pixels. Ignored while panning.
    pub fn hover_at(&mut self, screen_x: f64, screen_y: f64) -> bool {
        if self.controller.is_panning() {
            return false;
        }
        let (cx, cy) = self.screen_to_grid(screen_x, screen_y);
        self.update_hover(cx, cy)
    }

    fn draw_hover(&mut self) -> bool {
        let highlight = self
            .hovered
            .filter(|&(cx, cy)| self.grid.tile_index(cx, cy).is_some())
            .map(|(cx, cy)| {
                let min = self.controller.transform().grid_to_screen(cx, cy).as_vec2();
                let size = self.controller.view().scaled_tile_size() as f32;
                OverlayPrimitive::Rect {
                    min,
                    max: min + Vec2::splat(size),
                    style: RectStyle::outline(self.config.hover_color, 2.0),
                }
            });
        let drawn = self
            .overlay
            .update(OverlayRole::Hover, highlight, &mut self.surface);
        if drawn {
            self.hover_dirty = false;
        }
        drawn
    }

    pub fn screen_to_grid(&self, screen_x: f64, screen_y: f64) -> (i64, i64) {
        self.controller
            .transform()
            .screen_to_grid(DVec2::new(screen_x, screen_y))
    }

    pub fn grid_to_screen(&self, cx: i64, cy: i64) -> DVec2 {
        self.controller.transform().grid_to_screen(cx, cy)
    }

    pub fn cell_at(&self, cx: i64, cy: i64) -> Option<&Arc<Tile>> {
        self.grid.tile_at(cx, cy)
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            grid_width: self.grid.width(),
            grid_height: self.grid.height(),
            zoom: self.controller.zoom(),
            pan: self.controller.pan(),
            show_grid: self.show_grid,
            cell_count: self.grid.len(),
        }
    }
}

impl<S: RenderSurface, U: TextureUploader> Drop for TileEngine<S, U> {
    fn drop(&mut self) {
        self.teardown();
    }
}
