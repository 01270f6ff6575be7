//! Per-frame scratch storage that survives between frames.
//!
//! Every buffer here is cleared, never dropped, at the start of a frame, so a
//! steady-state frame performs no heap allocation.

use std::collections::HashSet;

use glam::Vec2;

use crate::grid::{TextureId, TileIndex};
use crate::surface::TextureHandle;

/// One tile that survived culling, in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleTileEntry {
    pub tile: TileIndex,
    /// Top-left corner in pixels.
    pub screen: Vec2,
    /// Edge length in pixels.
    pub size: f32,
}

/// What Phase 2 decided for one palette entry this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileSlot {
    /// Not collected this frame.
    #[default]
    Unseen,
    /// Collected, residency not resolved yet.
    Wanted,
    Resident(TextureHandle),
    /// Decode still in flight on the loader.
    Pending,
    /// Decode or upload failed this frame.
    Failed,
}

#[derive(Debug, Default)]
pub struct ReusableBufferPool {
    pub(crate) entries: Vec<VisibleTileEntry>,
    /// Counting-sort output, swapped with `entries` after sorting.
    pub(crate) sorted: Vec<VisibleTileEntry>,
    pub(crate) xs: Vec<f64>,
    pub(crate) ys: Vec<f64>,
    /// Indexed by palette index.
    pub(crate) slots: Vec<TileSlot>,
    pub(crate) offsets: Vec<u32>,
    /// Distinct palette indices in collection order.
    pub(crate) distinct: Vec<TileIndex>,
    pub(crate) misses: Vec<TileIndex>,
    pub(crate) wanted: HashSet<TextureId>,
    growths: u64,
}

impl ReusableBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets lengths; capacity is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted.clear();
        self.xs.clear();
        self.ys.clear();
        self.slots.clear();
        self.offsets.clear();
        self.distinct.clear();
        self.misses.clear();
        self.wanted.clear();
    }

    /// Clears the pool and makes sure a frame with at most `cells` visible
    /// entries over a `columns × rows` range and a palette of `palette_len`
    /// will not reallocate.
    pub fn prepare(&mut self, cells: usize, columns: usize, rows: usize, palette_len: usize) {
        self.clear();

        let short = self.entries.capacity() < cells
            || self.sorted.capacity() < cells
            || self.xs.capacity() < columns
            || self.ys.capacity() < rows
            || self.slots.capacity() < palette_len
            || self.offsets.capacity() < palette_len + 1;
        if short {
            self.growths += 1;
            log::trace!(
                "Growing frame buffers to {} entries, {}x{} range, palette {}",
                cells,
                columns,
                rows,
                palette_len
            );
            self.entries.reserve(cells);
            self.sorted.reserve(cells);
            self.xs.reserve(columns);
            self.ys.reserve(rows);
            self.slots.reserve(palette_len);
            self.offsets.reserve(palette_len + 1);
        }

        self.slots.resize(palette_len, TileSlot::Unseen);
    }

    pub fn entries(&self) -> &[VisibleTileEntry] {
        &self.entries
    }

    pub fn distinct(&self) -> &[TileIndex] {
        &self.distinct
    }

    pub fn slot(&self, tile: TileIndex) -> TileSlot {
        self.slots
            .get(tile as usize)
            .copied()
            .unwrap_or(TileSlot::Unseen)
    }

    /// Capacity of the visible-entry buffer.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// How many times [`prepare`](Self::prepare) had to grow a buffer.
    pub fn growths(&self) -> u64 {
        self.growths
    }

    #[inline]
    pub(crate) fn push(&mut self, entry: VisibleTileEntry) {
        let slot = &mut self.slots[entry.tile as usize];
        if *slot == TileSlot::Unseen {
            *slot = TileSlot::Wanted;
            self.distinct.push(entry.tile);
        }
        self.entries.push(entry);
    }

    /// Stable counting sort of the entries by palette index. Palette indices
    /// order like texture ids, so this is a stable sort by texture id.
    pub(crate) fn sort_by_tile(&mut self) {
        let buckets = self.slots.len();
        self.offsets.clear();
        self.offsets.resize(buckets + 1, 0);
        for entry in &self.entries {
            self.offsets[entry.tile as usize + 1] += 1;
        }
        for i in 1..=buckets {
            self.offsets[i] += self.offsets[i - 1];
        }

        self.sorted.clear();
        self.sorted.extend_from_slice(&self.entries);
        for entry in &self.entries {
            let at = &mut self.offsets[entry.tile as usize];
            self.sorted[*at as usize] = *entry;
            *at += 1;
        }
        std::mem::swap(&mut self.entries, &mut self.sorted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tile: TileIndex, x: f32) -> VisibleTileEntry {
        VisibleTileEntry {
            tile,
            screen: Vec2::new(x, 0.0),
            size: 16.0,
        }
    }

    #[test]
    fn push_tracks_distinct_in_first_seen_order() {
        let mut pool = ReusableBufferPool::new();
        pool.prepare(8, 8, 1, 4);
        for (tile, x) in [(2, 0.0), (0, 1.0), (2, 2.0), (3, 3.0), (0, 4.0)] {
            pool.push(entry(tile, x));
        }
        assert_eq!(pool.entries().len(), 5);
        assert_eq!(pool.distinct(), &[2, 0, 3]);
        assert_eq!(pool.slot(1), TileSlot::Unseen);
        assert_eq!(pool.slot(3), TileSlot::Wanted);
    }

    #[test]
    fn counting_sort_is_stable() {
        let mut pool = ReusableBufferPool::new();
        pool.prepare(8, 8, 1, 3);
        for (tile, x) in [(2, 0.0), (0, 1.0), (2, 2.0), (1, 3.0), (0, 4.0), (2, 5.0)] {
            pool.push(entry(tile, x));
        }
        pool.sort_by_tile();

        let order: Vec<_> = pool.entries().iter().map(|e| (e.tile, e.screen.x)).collect();
        assert_eq!(
            order,
            vec![(0, 1.0), (0, 4.0), (1, 3.0), (2, 0.0), (2, 2.0), (2, 5.0)]
        );
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut pool = ReusableBufferPool::new();
        pool.prepare(100, 10, 10, 5);
        for i in 0..100 {
            pool.push(entry(i % 5, i as f32));
        }
        let cap = pool.capacity();
        pool.clear();
        assert!(pool.entries().is_empty());
        assert!(pool.distinct().is_empty());
        assert_eq!(pool.capacity(), cap);
    }

    #[test]
    fn prepare_grows_only_when_needed() {
        let mut pool = ReusableBufferPool::new();
        pool.prepare(64, 8, 8, 4);
        assert_eq!(pool.growths(), 1);
        pool.prepare(64, 8, 8, 4);
        pool.prepare(10, 2, 5, 1);
        assert_eq!(pool.growths(), 1);
        pool.prepare(4096, 64, 64, 4);
        assert_eq!(pool.growths(), 2);
    }
}
