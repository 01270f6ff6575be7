//! Grid-line and hover-highlight layers drawn on top of the tiles.
//!
//! Each role remembers the exact items it drew so that an update can retract
//! them without touching the tile layer.

use std::time::{Duration, Instant};

use glam::Vec2;

use crate::surface::{ItemId, RectStyle, RenderSurface, Rgba};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayRole {
    GridLines,
    Hover,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayPrimitive {
    Line {
        from: Vec2,
        to: Vec2,
        color: Rgba,
        thickness: f32,
    },
    Rect {
        min: Vec2,
        max: Vec2,
        style: RectStyle,
    },
}

impl OverlayPrimitive {
    fn draw<S: RenderSurface + ?Sized>(&self, surface: &mut S) -> ItemId {
        match *self {
            OverlayPrimitive::Line {
                from,
                to,
                color,
                thickness,
            } => surface.draw_line(from, to, color, thickness),
            OverlayPrimitive::Rect { min, max, style } => surface.draw_rect(min, max, style),
        }
    }
}

#[derive(Debug)]
pub struct OverlayManager {
    grid_items: Vec<ItemId>,
    hover_items: Vec<ItemId>,
    hover_interval: Duration,
    last_hover: Option<Instant>,
    grid_updates: u64,
    hover_updates: u64,
}

impl OverlayManager {
    pub fn new(hover_interval: Duration) -> Self {
        Self {
            grid_items: Vec::new(),
            hover_items: Vec::new(),
            hover_interval,
            last_hover: None,
            grid_updates: 0,
            hover_updates: 0,
        }
    }

    pub fn hover_interval(&self) -> Duration {
        self.hover_interval
    }

    pub fn items(&self, role: OverlayRole) -> &[ItemId] {
        match role {
            OverlayRole::GridLines => &self.grid_items,
            OverlayRole::Hover => &self.hover_items,
        }
    }

    /// Completed updates for `role` so far.
    pub fn updates(&self, role: OverlayRole) -> u64 {
        match role {
            OverlayRole::GridLines => self.grid_updates,
            OverlayRole::Hover => self.hover_updates,
        }
    }

    /// Replaces everything previously drawn for `role` with `primitives`.
    ///
    /// Returns `false` without touching anything when the surface is detached.
    pub fn update<S, I>(&mut self, role: OverlayRole, primitives: I, surface: &mut S) -> bool
    where
        S: RenderSurface + ?Sized,
        I: IntoIterator<Item = OverlayPrimitive>,
    {
        if !surface.is_attached() {
            return false;
        }

        let (items, counter) = match role {
            OverlayRole::GridLines => (&mut self.grid_items, &mut self.grid_updates),
            OverlayRole::Hover => (&mut self.hover_items, &mut self.hover_updates),
        };

        for item in items.drain(..) {
            if surface.item_exists(item) {
                surface.delete_item(item);
            }
        }
        items.extend(primitives.into_iter().map(|p| p.draw(&mut *surface)));
        *counter += 1;
        true
    }

    /// Retracts every item drawn for `role`.
    pub fn clear_role<S: RenderSurface + ?Sized>(&mut self, role: OverlayRole, surface: &mut S) -> bool {
        self.update(role, std::iter::empty::<OverlayPrimitive>(), surface)
    }

    /// Drops tracking after the surface itself was cleared; the items are
    /// already gone.
    pub fn forget_all(&mut self) {
        self.grid_items.clear();
        self.hover_items.clear();
    }

    /// Accepts a hover update at `now` unless the previous accepted one was
    /// less than the hover interval ago.
    pub fn accept_hover(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_hover {
            if now.saturating_duration_since(last) < self.hover_interval {
                return false;
            }
        }
        self.last_hover = Some(now);
        true
    }
}

/// Lines outlining every cell of the inclusive range `[start_x, end_x] ×
/// [start_y, end_y]`, given the cell edge length and the grid origin on screen.
pub fn grid_line_primitives(
    start: (i64, i64),
    end: (i64, i64),
    scale: f64,
    pan: (f64, f64),
    color: Rgba,
) -> impl Iterator<Item = OverlayPrimitive> {
    let (start_x, start_y) = start;
    let (end_x, end_y) = end;
    let (pan_x, pan_y) = pan;

    let x0 = (start_x as f64 * scale + pan_x) as f32;
    let x1 = ((end_x + 1) as f64 * scale + pan_x) as f32;
    let y0 = (start_y as f64 * scale + pan_y) as f32;
    let y1 = ((end_y + 1) as f64 * scale + pan_y) as f32;

    let vertical = (start_x..end_x + 2).map(move |x| {
        let sx = (x as f64 * scale + pan_x) as f32;
        OverlayPrimitive::Line {
            from: Vec2::new(sx, y0),
            to: Vec2::new(sx, y1),
            color,
            thickness: 1.0,
        }
    });
    let horizontal = (start_y..end_y + 2).map(move |y| {
        let sy = (y as f64 * scale + pan_y) as f32;
        OverlayPrimitive::Line {
            from: Vec2::new(x0, sy),
            to: Vec2::new(x1, sy),
            color,
            thickness: 1.0,
        }
    });
    vertical.chain(horizontal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterSurface;

    fn rect(x: f32) -> OverlayPrimitive {
        OverlayPrimitive::Rect {
            min: Vec2::new(x, 0.0),
            max: Vec2::new(x + 16.0, 16.0),
            style: RectStyle::outline(Rgba([255, 255, 255, 200]), 2.0),
        }
    }

    #[test]
    fn update_replaces_exactly_previous_items() {
        let mut surface = RasterSurface::new(64, 64);
        let mut overlay = OverlayManager::new(Duration::from_millis(50));

        overlay.update(OverlayRole::Hover, [rect(0.0), rect(16.0)], &mut surface);
        let first: Vec<_> = overlay.items(OverlayRole::Hover).to_vec();
        assert_eq!(first.len(), 2);

        overlay.update(OverlayRole::Hover, [rect(32.0)], &mut surface);
        assert!(first.iter().all(|item| !surface.item_exists(*item)));
        assert_eq!(overlay.items(OverlayRole::Hover).len(), 1);
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn roles_do_not_touch_each_other() {
        let mut surface = RasterSurface::new(64, 64);
        let mut overlay = OverlayManager::new(Duration::from_millis(50));

        let lines = grid_line_primitives((0, 0), (1, 1), 16.0, (0.0, 0.0), Rgba([1, 1, 1, 255]));
        overlay.update(OverlayRole::GridLines, lines, &mut surface);
        overlay.update(OverlayRole::Hover, [rect(0.0)], &mut surface);
        overlay.clear_role(OverlayRole::Hover, &mut surface);

        assert_eq!(overlay.items(OverlayRole::GridLines).len(), 6);
        assert!(overlay.items(OverlayRole::Hover).is_empty());
        assert_eq!(surface.len(), 6);
    }

    #[test]
    fn detached_surface_is_left_alone() {
        let mut surface = RasterSurface::new(64, 64);
        surface.detach();
        let mut overlay = OverlayManager::new(Duration::from_millis(50));
        assert!(!overlay.update(OverlayRole::Hover, [rect(0.0)], &mut surface));
        assert_eq!(overlay.updates(OverlayRole::Hover), 0);
        assert!(overlay.items(OverlayRole::Hover).is_empty());
    }

    #[test]
    fn hover_is_throttled() {
        let mut overlay = OverlayManager::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(overlay.accept_hover(t0));
        for ms in [1, 10, 25, 49] {
            assert!(!overlay.accept_hover(t0 + Duration::from_millis(ms)));
        }
        assert!(overlay.accept_hover(t0 + Duration::from_millis(50)));
        assert!(!overlay.accept_hover(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn grid_lines_cover_range_plus_one() {
        let lines: Vec<_> =
            grid_line_primitives((2, 3), (5, 4), 10.0, (1.0, 0.0), Rgba([0, 0, 0, 255])).collect();
        // 5 - 2 + 2 vertical, 4 - 3 + 2 horizontal
        assert_eq!(lines.len(), 5 + 3);
        assert_eq!(
            lines[0],
            OverlayPrimitive::Line {
                from: Vec2::new(21.0, 30.0),
                to: Vec2::new(21.0, 50.0),
                color: Rgba([0, 0, 0, 255]),
                thickness: 1.0,
            }
        );
    }
}
