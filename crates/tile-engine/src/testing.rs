//! Helpers shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::decode::TileDecoder;
use crate::error::DecodeError;
use crate::grid::{Grid, TextureId, Tile};
use crate::surface::{PixelBuffer, Rgba};

/// In-memory decoder that records every call, fails listed ids and can be
/// slowed down.
#[derive(Default)]
pub struct FakeDecoder {
    calls: Mutex<Vec<TextureId>>,
    failing: Mutex<HashSet<TextureId>>,
    delay: Mutex<Duration>,
}

impl FakeDecoder {
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn decoded(&self) -> Vec<TextureId> {
        self.calls.lock().clone()
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(id.into());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

impl TileDecoder for FakeDecoder {
    fn decode(&self, tile: &Tile) -> Result<PixelBuffer, DecodeError> {
        self.calls.lock().push(tile.id.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.failing.lock().contains(&tile.id) {
            return Err(DecodeError::Unavailable(tile.id.clone()));
        }
        Ok(PixelBuffer::solid(2, 2, Rgba([10, 20, 30, 255])))
    }
}

/// `width × height` grid whose cell (x, y) uses texture `t{(x + y) % kinds}`.
pub fn diagonal_grid(width: usize, height: usize, kinds: usize) -> Grid {
    let tiles = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x + y) % kinds))
        .map(|k| Arc::new(Tile::new(format!("t{k}"), format!("t{k}.png"))))
        .collect();
    Grid::new(width, height, tiles).unwrap()
}
