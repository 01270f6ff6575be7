//! Tiles and the immutable grid handed to the engine by the upstream mapper.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::EngineError;

/// Identifier of a texture. Cheap to clone; ordered lexically.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(Arc<str>);

impl TextureId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({:?})", &*self.0)
    }
}

impl From<&str> for TextureId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TextureId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A grid cell's reference to a texture, plus what is needed to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub id: TextureId,
    /// Where the decoder finds the source pixels.
    pub source: PathBuf,
    /// Average colour of the texture, used for the placeholder while the
    /// texture is missing.
    pub fallback_color: Option<[u8; 3]>,
}

impl Tile {
    pub fn new(id: impl Into<TextureId>, source: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            source: source.as_ref().to_path_buf(),
            fallback_color: None,
        }
    }

    pub fn with_fallback_color(mut self, rgb: [u8; 3]) -> Self {
        self.fallback_color = Some(rgb);
        self
    }
}

/// Index into [`Grid::palette`].
pub type TileIndex = u32;

/// Fixed-size, row-major grid of tiles.
///
/// Tiles are deduplicated by texture id into a palette sorted by id, so a
/// palette index orders exactly like the texture id it stands for. Cells store
/// palette indices.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<TileIndex>,
    palette: Vec<Arc<Tile>>,
    /// Palette indices in order of first appearance (row-major scan).
    first_seen: Vec<TileIndex>,
}

impl Grid {
    /// Builds a grid from `width * height` tiles in row-major order.
    ///
    /// When two tiles share a texture id the first one wins.
    pub fn new(width: usize, height: usize, tiles: Vec<Arc<Tile>>) -> Result<Self, EngineError> {
        if width.checked_mul(height) != Some(tiles.len()) {
            return Err(EngineError::GridShape {
                width,
                height,
                len: tiles.len(),
            });
        }
        if tiles.is_empty() {
            return Ok(Self::empty());
        }

        let mut unique: BTreeMap<TextureId, Arc<Tile>> = BTreeMap::new();
        for tile in &tiles {
            unique
                .entry(tile.id.clone())
                .or_insert_with(|| Arc::clone(tile));
        }

        let index_of: HashMap<TextureId, TileIndex> = unique
            .keys()
            .enumerate()
            .map(|(i, id)| (id.clone(), i as TileIndex))
            .collect();
        let palette: Vec<Arc<Tile>> = unique.into_values().collect();

        let mut seen = vec![false; palette.len()];
        let mut first_seen = Vec::with_capacity(palette.len());
        let cells = tiles
            .iter()
            .map(|tile| {
                let idx = index_of[&tile.id];
                if !seen[idx as usize] {
                    seen[idx as usize] = true;
                    first_seen.push(idx);
                }
                idx
            })
            .collect();

        Ok(Self {
            width,
            height,
            cells,
            palette,
            first_seen,
        })
    }

    /// Builds a grid from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<Arc<Tile>>>) -> Result<Self, EngineError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let len: usize = rows.iter().map(Vec::len).sum();
        if rows.iter().any(|r| r.len() != width) {
            return Err(EngineError::GridShape { width, height, len });
        }
        Self::new(width, height, rows.into_iter().flatten().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// One row of palette indices. Panics if `y` is out of range.
    #[inline]
    pub fn row(&self, y: usize) -> &[TileIndex] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    pub fn tile_index(&self, x: i64, y: i64) -> Option<TileIndex> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.cells[y as usize * self.width + x as usize])
    }

    pub fn tile_at(&self, x: i64, y: i64) -> Option<&Arc<Tile>> {
        self.tile_index(x, y).map(|idx| self.tile(idx))
    }

    #[inline]
    pub fn tile(&self, idx: TileIndex) -> &Arc<Tile> {
        &self.palette[idx as usize]
    }

    /// Distinct tiles, sorted by texture id.
    pub fn palette(&self) -> &[Arc<Tile>] {
        &self.palette
    }

    /// Distinct palette indices in order of first appearance.
    pub fn distinct_in_order(&self) -> &[TileIndex] {
        &self.first_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: &str) -> Arc<Tile> {
        Arc::new(Tile::new(id, format!("{id}.png")))
    }

    #[test]
    fn rejects_mismatched_shape() {
        let err = Grid::new(3, 2, vec![tile("a"); 5]).unwrap_err();
        assert!(matches!(err, EngineError::GridShape { len: 5, .. }));
    }

    #[test]
    fn palette_is_sorted_and_deduplicated() {
        let grid = Grid::new(2, 2, vec![tile("stone"), tile("dirt"), tile("stone"), tile("air")])
            .unwrap();

        let ids: Vec<_> = grid.palette().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["air", "dirt", "stone"]);
        assert_eq!(grid.row(0), &[2, 1]);
        assert_eq!(grid.row(1), &[2, 0]);
        assert_eq!(grid.distinct_in_order(), &[2, 1, 0]);
    }

    #[test]
    fn lookups_outside_bounds_are_none() {
        let grid = Grid::new(2, 1, vec![tile("a"), tile("b")]).unwrap();
        assert_eq!(grid.tile_at(1, 0).unwrap().id.as_str(), "b");
        assert!(grid.tile_at(2, 0).is_none());
        assert!(grid.tile_at(-1, 0).is_none());
        assert!(grid.tile_at(0, 1).is_none());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows = vec![vec![tile("a"), tile("b")], vec![tile("c")]];
        assert!(Grid::from_rows(rows).is_err());
    }

    #[test]
    fn empty_grid() {
        let grid = Grid::new(0, 0, Vec::new()).unwrap();
        assert!(grid.is_empty());
        assert!(grid.palette().is_empty());
    }
}
