use glam::DVec2;

use crate::transform::{CoordinateTransform, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Multiplicative zoom step for the band `zoom` falls in. Steps are coarse
/// when zoomed far out and fine when zoomed far in.
pub fn zoom_step(zoom: f64, direction: ZoomDirection) -> f64 {
    let band = if zoom < 0.5 {
        0
    } else if zoom < 1.0 {
        1
    } else if zoom < 4.0 {
        2
    } else {
        3
    };
    match direction {
        ZoomDirection::In => [1.30, 1.25, 1.20, 1.15][band],
        ZoomDirection::Out => [0.77, 0.80, 0.83, 0.87][band],
    }
}

/// Owns the view state and the pointer-drag pan gesture.
///
/// Every mutating method reports whether the caller should re-render.
#[derive(Debug, Clone)]
pub struct PanZoomController {
    view: ViewState,
    min_zoom: f64,
    max_zoom: f64,
    panning: bool,
    /// Pointer and pan at the moment the drag started.
    drag_origin: Option<(DVec2, DVec2)>,
}

impl PanZoomController {
    pub fn new(tile_size: f64, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            view: ViewState::new(tile_size),
            min_zoom,
            max_zoom,
            panning: false,
            drag_origin: None,
        }
    }

    #[inline]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.view.zoom
    }

    #[inline]
    pub fn pan(&self) -> DVec2 {
        self.view.pan
    }

    #[inline]
    pub fn transform(&self) -> CoordinateTransform {
        self.view.transform()
    }

    #[inline]
    pub fn is_panning(&self) -> bool {
        self.panning
    }

    pub fn pan_by(&mut self, delta: DVec2) -> bool {
        if delta == DVec2::ZERO {
            return false;
        }
        self.view.pan += delta;
        true
    }

    /// Clamps `zoom` to the allowed range and keeps the grid point under
    /// `focus` fixed on screen. Returns whether the zoom changed.
    pub fn set_zoom(&mut self, zoom: f64, focus: DVec2) -> bool {
        let old = self.view.zoom;
        let new = zoom.clamp(self.min_zoom, self.max_zoom);
        if new == old {
            return false;
        }

        let anchor = (focus - self.view.pan) / old;
        self.view.pan = focus - anchor * new;
        self.view.zoom = new;
        true
    }

    pub fn zoom_step(&mut self, direction: ZoomDirection, focus: DVec2) -> bool {
        let zoom = self.view.zoom * zoom_step(self.view.zoom, direction);
        self.set_zoom(zoom, focus)
    }

    /// Fits a `columns × rows` grid inside `viewport` minus `margin`, centred.
    ///
    /// The fitted zoom is capped at `max_zoom` but not raised to `min_zoom`, so
    /// that very large grids still fit entirely.
    pub fn zoom_to_fit(&mut self, columns: usize, rows: usize, viewport: DVec2, margin: f64) -> bool {
        if columns == 0 || rows == 0 {
            return false;
        }

        let extent = DVec2::new(columns as f64, rows as f64) * self.view.tile_size;
        let fit = (viewport - DVec2::splat(margin)) / extent;
        let mut zoom = fit.min_element().min(self.max_zoom);
        if !(zoom > 0.0) {
            zoom = self.min_zoom;
        }

        self.view.zoom = zoom;
        self.view.pan = (viewport - extent * zoom) / 2.0;
        true
    }

    pub fn reset(&mut self) {
        self.view.zoom = 1.0;
        self.view.pan = DVec2::ZERO;
    }

    pub fn start_pan(&mut self, pointer: DVec2) {
        self.panning = true;
        self.drag_origin = Some((pointer, self.view.pan));
    }

    /// Moves the view with the pointer while a drag is active.
    pub fn update_pan(&mut self, pointer: DVec2) -> bool {
        let Some((pointer_start, pan_start)) = self.drag_origin.filter(|_| self.panning) else {
            return false;
        };
        let pan = pan_start + (pointer - pointer_start);
        if pan == self.view.pan {
            return false;
        }
        self.view.pan = pan;
        true
    }

    /// Ends the drag. Returns `true` only if a drag was actually active.
    pub fn stop_pan(&mut self) -> bool {
        let was_panning = self.panning;
        self.panning = false;
        self.drag_origin = None;
        was_panning
    }

    /// Ends any drag, stuck or not. Always asks for a render.
    pub fn force_stop_pan(&mut self) -> bool {
        self.panning = false;
        self.drag_origin = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PanZoomController {
        PanZoomController::new(16.0, 0.1, 32.0)
    }

    #[test]
    fn zoom_bands() {
        assert_eq!(zoom_step(0.3, ZoomDirection::In), 1.30);
        assert_eq!(zoom_step(0.5, ZoomDirection::In), 1.25);
        assert_eq!(zoom_step(1.0, ZoomDirection::In), 1.20);
        assert_eq!(zoom_step(5.0, ZoomDirection::In), 1.15);
        assert_eq!(zoom_step(0.3, ZoomDirection::Out), 0.77);
        assert_eq!(zoom_step(3.99, ZoomDirection::Out), 0.83);
        assert_eq!(zoom_step(5.0, ZoomDirection::Out), 0.87);
    }

    #[test]
    fn zoom_in_from_point_three_and_five() {
        let mut c = controller();
        c.set_zoom(0.3, DVec2::ZERO);
        assert!(c.zoom_step(ZoomDirection::In, DVec2::ZERO));
        assert!((c.zoom() - 0.39).abs() < 1e-12);

        c.set_zoom(5.0, DVec2::ZERO);
        c.zoom_step(ZoomDirection::In, DVec2::ZERO);
        assert!((c.zoom() - 5.75).abs() < 1e-12);
    }

    #[test]
    fn zoom_is_clamped_and_reports_no_change_at_limits() {
        let mut c = controller();
        assert!(c.set_zoom(100.0, DVec2::ZERO));
        assert_eq!(c.zoom(), 32.0);
        assert!(!c.zoom_step(ZoomDirection::In, DVec2::ZERO));

        c.set_zoom(0.0, DVec2::ZERO);
        assert_eq!(c.zoom(), 0.1);
    }

    #[test]
    fn set_zoom_keeps_focus_fixed() {
        let mut c = controller();
        c.pan_by(DVec2::new(30.0, -12.0));
        let focus = DVec2::new(400.0, 300.0);
        let before = c.transform().screen_to_cell_space(focus);
        c.set_zoom(2.5, focus);
        let after = c.transform().screen_to_cell_space(focus);
        assert!((before - after).length() < 1e-9);
    }

    #[test]
    fn zoom_to_fit_centres_grid() {
        let mut c = controller();
        assert!(c.zoom_to_fit(100, 50, DVec2::new(840.0, 600.0), 40.0));
        // 800 / 1600 = 0.5 is tighter than 560 / 800 = 0.7
        assert_eq!(c.zoom(), 0.5);
        assert_eq!(c.pan(), DVec2::new(20.0, 100.0));
        assert!(!c.zoom_to_fit(0, 0, DVec2::new(840.0, 600.0), 40.0));
    }

    #[test]
    fn zoom_to_fit_tiny_grid_stops_at_max_zoom() {
        let mut c = controller();
        assert!(c.zoom_to_fit(1, 1, DVec2::new(800.0, 600.0), 40.0));
        let fitted = c.zoom();
        assert_eq!(fitted, 32.0);
        assert_eq!(c.pan(), DVec2::new(400.0 - 256.0, 300.0 - 256.0));

        c.zoom_step(ZoomDirection::In, DVec2::new(400.0, 300.0));
        assert!(c.zoom() >= fitted);
    }

    #[test]
    fn drag_moves_relative_to_start() {
        let mut c = controller();
        c.pan_by(DVec2::new(5.0, 5.0));
        c.start_pan(DVec2::new(100.0, 100.0));
        assert!(c.update_pan(DVec2::new(110.0, 90.0)));
        assert_eq!(c.pan(), DVec2::new(15.0, -5.0));
        assert!(!c.update_pan(DVec2::new(110.0, 90.0)));
    }

    #[test]
    fn update_pan_without_drag_is_ignored() {
        let mut c = controller();
        assert!(!c.update_pan(DVec2::new(50.0, 50.0)));
        assert_eq!(c.pan(), DVec2::ZERO);
    }

    #[test]
    fn stop_pan_reports_only_active_drags() {
        let mut c = controller();
        assert!(!c.stop_pan());
        c.start_pan(DVec2::ZERO);
        assert!(c.stop_pan());
        assert!(!c.stop_pan());
        assert!(c.force_stop_pan());
        assert!(!c.is_panning());
    }
}
