//! Viewport culling: which cells can possibly be on screen.

use glam::DVec2;

use crate::transform::CoordinateTransform;

/// Inclusive cell range `[start_x, end_x] × [start_y, end_y]`.
///
/// Empty when `start_x > end_x` or `start_y > end_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_x: i64,
    pub end_x: i64,
    pub start_y: i64,
    pub end_y: i64,
}

impl CellRange {
    pub const EMPTY: Self = Self {
        start_x: 0,
        end_x: -1,
        start_y: 0,
        end_y: -1,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start_x > self.end_x || self.start_y > self.end_y
    }

    #[inline]
    pub fn columns(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end_x - self.start_x + 1) as usize
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end_y - self.start_y + 1) as usize
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.columns() * self.rows()
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.start_x..=self.end_x).contains(&x) && (self.start_y..=self.end_y).contains(&y)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewportCuller {
    /// Pixels added on every side so tiles appear before they scroll in.
    padding: f64,
}

impl ViewportCuller {
    pub fn new(padding: f64) -> Self {
        Self {
            padding: padding.max(0.0),
        }
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Cells overlapping the padded viewport, clamped to the grid. O(1).
    pub fn cull(
        &self,
        transform: &CoordinateTransform,
        viewport: DVec2,
        grid_width: usize,
        grid_height: usize,
    ) -> CellRange {
        if grid_width == 0 || grid_height == 0 {
            return CellRange::EMPTY;
        }

        let inv = transform.inv_scale();
        let pan = transform.pan();
        let pad = self.padding;

        let start_x = ((-pad - pan.x) * inv).floor();
        let end_x = ((viewport.x + pad - pan.x) * inv).floor();
        let start_y = ((-pad - pan.y) * inv).floor();
        let end_y = ((viewport.y + pad - pan.y) * inv).floor();

        let range = CellRange {
            start_x: (start_x as i64).max(0),
            end_x: (end_x as i64).min(grid_width as i64 - 1),
            start_y: (start_y as i64).max(0),
            end_y: (end_y as i64).min(grid_height as i64 - 1),
        };

        if range.is_empty() {
            CellRange::EMPTY
        } else {
            range
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ViewState;

    fn view(pan: (f64, f64), zoom: f64) -> CoordinateTransform {
        ViewState {
            pan: DVec2::new(pan.0, pan.1),
            zoom,
            tile_size: 16.0,
        }
        .transform()
    }

    #[test]
    fn five_by_five_window_over_ten_by_ten_grid() {
        let culler = ViewportCuller::new(0.0);
        let range = culler.cull(&view((0.0, 0.0), 1.0), DVec2::new(80.0, 80.0), 10, 10);
        // Cell 5 starts exactly on the right/bottom edge and is kept.
        assert_eq!(
            range,
            CellRange {
                start_x: 0,
                end_x: 5,
                start_y: 0,
                end_y: 5
            }
        );
        assert_eq!(range.cell_count(), 36);
    }

    #[test]
    fn padding_widens_range_but_stays_clamped() {
        let culler = ViewportCuller::new(50.0);
        let range = culler.cull(&view((0.0, 0.0), 1.0), DVec2::new(80.0, 80.0), 10, 10);
        assert_eq!((range.start_x, range.end_x), (0, 8));
        assert_eq!((range.start_y, range.end_y), (0, 8));
    }

    #[test]
    fn viewport_right_of_grid_is_empty() {
        let culler = ViewportCuller::new(50.0);
        let range = culler.cull(&view((-10_000.0, 0.0), 1.0), DVec2::new(800.0, 600.0), 10, 10);
        assert!(range.is_empty());
        assert_eq!(range.cell_count(), 0);
    }

    #[test]
    fn viewport_above_grid_is_empty() {
        let culler = ViewportCuller::new(0.0);
        let range = culler.cull(&view((0.0, 5_000.0), 1.0), DVec2::new(800.0, 600.0), 10, 10);
        assert!(range.is_empty());
    }

    #[test]
    fn empty_grid_is_empty_range() {
        let culler = ViewportCuller::new(50.0);
        assert!(culler
            .cull(&view((0.0, 0.0), 1.0), DVec2::new(800.0, 600.0), 0, 0)
            .is_empty());
    }

    #[test]
    fn range_always_inside_grid() {
        let culler = ViewportCuller::new(50.0);
        let (w, h) = (37usize, 23usize);
        for zoom in [0.1, 0.5, 1.0, 3.3, 32.0] {
            for px in [-5000.0, -300.0, -17.5, 0.0, 42.0, 700.0, 9000.0] {
                for py in [-4000.0, -8.0, 0.0, 250.0, 7000.0] {
                    let r = culler.cull(&view((px, py), zoom), DVec2::new(640.0, 480.0), w, h);
                    if r.is_empty() {
                        continue;
                    }
                    assert!(r.start_x >= 0 && r.end_x <= w as i64 - 1);
                    assert!(r.start_y >= 0 && r.end_y <= h as i64 - 1);
                }
            }
        }
    }
}
