//! Off-thread texture decoding.
//!
//! Tiles are decoded on a fixed rayon pool and the results are sent back to
//! the render thread over a channel. The render thread joins a batch with a
//! per-result timeout; anything that misses the timeout simply arrives on a
//! later frame. There is no cancellation: stragglers are not waited for.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::decode::TileDecoder;
use crate::error::{DecodeError, EngineError};
use crate::grid::{TextureId, Tile};
use crate::surface::PixelBuffer;

/// One finished decode, successful or not.
#[derive(Debug)]
pub struct LoadResult {
    pub tile: Arc<Tile>,
    pub outcome: Result<PixelBuffer, DecodeError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinSummary {
    /// Results handed to the callback, wanted or not.
    pub received: usize,
    /// Wanted ids still outstanding when the join gave up.
    pub outstanding: usize,
}

impl JoinSummary {
    pub fn timed_out(&self) -> bool {
        self.outstanding > 0
    }
}

pub struct AsyncAssetLoader {
    pool: rayon::ThreadPool,
    decoder: Arc<dyn TileDecoder>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
    /// Ids queued on the pool whose result has not been received yet.
    in_flight: HashSet<TextureId>,
    result_timeout: Duration,
}

impl AsyncAssetLoader {
    pub fn new(
        threads: usize,
        decoder: Arc<dyn TileDecoder>,
        result_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("tile-loader-{i}"))
            .build()?;
        let (tx, rx) = crossbeam_channel::unbounded();

        log::debug!(
            "Tile loader started with {} workers, result timeout {:?}",
            pool.current_num_threads(),
            result_timeout
        );

        Ok(Self {
            pool,
            decoder,
            tx,
            rx,
            in_flight: HashSet::new(),
            result_timeout,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn result_timeout(&self) -> Duration {
        self.result_timeout
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: &TextureId) -> bool {
        self.in_flight.contains(id)
    }

    /// Queues a decode for every tile not already in flight. Returns how many
    /// were queued.
    pub fn submit<'a>(&mut self, tiles: impl IntoIterator<Item = &'a Arc<Tile>>) -> usize {
        let mut queued = 0;
        for tile in tiles {
            if !self.in_flight.insert(tile.id.clone()) {
                continue;
            }
            let tile = Arc::clone(tile);
            let decoder = Arc::clone(&self.decoder);
            let tx = self.tx.clone();
            self.pool.spawn(move || {
                let outcome = decoder.decode(&tile);
                // The receiver only goes away with the loader itself.
                let _ = tx.send(LoadResult { tile, outcome });
            });
            queued += 1;
        }
        queued
    }

    /// Queues at most `cap` tiles; used for the bounded preload on grid load.
    pub fn prefetch<'a>(
        &mut self,
        tiles: impl IntoIterator<Item = &'a Arc<Tile>>,
        cap: usize,
    ) -> usize {
        self.submit(tiles.into_iter().take(cap))
    }

    /// Hands every already-finished result to `on_result` without blocking.
    pub fn drain_ready(&mut self, mut on_result: impl FnMut(LoadResult)) -> usize {
        let mut received = 0;
        while let Ok(result) = self.rx.try_recv() {
            self.in_flight.remove(&result.tile.id);
            on_result(result);
            received += 1;
        }
        received
    }

    /// Blocks until every id in `wanted` that is in flight has reported, or
    /// until no result arrives within the result timeout.
    ///
    /// Results for ids outside `wanted` (stragglers from earlier batches) are
    /// passed to `on_result` as well.
    pub fn join(
        &mut self,
        wanted: &HashSet<TextureId>,
        mut on_result: impl FnMut(LoadResult),
    ) -> JoinSummary {
        let mut summary = JoinSummary {
            received: 0,
            outstanding: wanted.iter().filter(|id| self.in_flight.contains(*id)).count(),
        };

        while summary.outstanding > 0 {
            match self.rx.recv_timeout(self.result_timeout) {
                Ok(result) => {
                    let id = &result.tile.id;
                    if self.in_flight.remove(id) && wanted.contains(id) {
                        summary.outstanding -= 1;
                    }
                    on_result(result);
                    summary.received += 1;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if summary.timed_out() {
            log::trace!(
                "Loader join timed out with {} textures outstanding",
                summary.outstanding
            );
        }
        summary
    }
}

impl std::fmt::Debug for AsyncAssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncAssetLoader")
            .field("threads", &self.threads())
            .field("in_flight", &self.in_flight.len())
            .field("result_timeout", &self.result_timeout)
            .finish()
    }
}
