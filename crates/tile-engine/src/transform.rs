//! Pan/zoom state and the cell ↔ screen mapping derived from it.

use glam::DVec2;

/// Cell-space slack below an integer boundary that still snaps up to it, so
/// that a pixel computed from a cell's corner maps back to that cell.
const CELL_SNAP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Screen position (pixels) of the grid's top-left corner.
    pub pan: DVec2,
    /// Magnification, always > 0.
    pub zoom: f64,
    /// Native tile edge in pixels.
    pub tile_size: f64,
}

impl ViewState {
    pub fn new(tile_size: f64) -> Self {
        Self {
            pan: DVec2::ZERO,
            zoom: 1.0,
            tile_size,
        }
    }

    /// On-screen edge of one tile.
    #[inline]
    pub fn scaled_tile_size(&self) -> f64 {
        self.tile_size * self.zoom
    }

    #[inline]
    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(self)
    }
}

/// Snapshot of a [`ViewState`] with `tile_size * zoom` and its reciprocal
/// computed once, for use inside hot loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    scale: f64,
    inv_scale: f64,
    pan: DVec2,
}

impl CoordinateTransform {
    pub fn new(view: &ViewState) -> Self {
        let scale = view.scaled_tile_size();
        Self {
            scale,
            inv_scale: scale.recip(),
            pan: view.pan,
        }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn inv_scale(&self) -> f64 {
        self.inv_scale
    }

    #[inline]
    pub fn pan(&self) -> DVec2 {
        self.pan
    }

    #[inline]
    pub fn screen_x(&self, cell_x: i64) -> f64 {
        cell_x as f64 * self.scale + self.pan.x
    }

    #[inline]
    pub fn screen_y(&self, cell_y: i64) -> f64 {
        cell_y as f64 * self.scale + self.pan.y
    }

    /// Top-left screen corner of a cell.
    #[inline]
    pub fn grid_to_screen(&self, cell_x: i64, cell_y: i64) -> DVec2 {
        DVec2::new(self.screen_x(cell_x), self.screen_y(cell_y))
    }

    /// Cell containing a screen point, possibly outside the grid.
    #[inline]
    pub fn screen_to_grid(&self, screen: DVec2) -> (i64, i64) {
        let cell = (screen - self.pan) * self.inv_scale;
        (
            (cell.x + CELL_SNAP_EPSILON).floor() as i64,
            (cell.y + CELL_SNAP_EPSILON).floor() as i64,
        )
    }

    /// Fractional cell coordinate of a screen point, without flooring.
    #[inline]
    pub fn screen_to_cell_space(&self, screen: DVec2) -> DVec2 {
        (screen - self.pan) * self.inv_scale
    }
}
