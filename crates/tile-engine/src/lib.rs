// src/lib.rs
//! Tile rendering engine for very large grids of textured tiles.
//!
//! Each frame culls the grid to the viewport, makes every visible texture
//! resident (decoding misses on a background pool), and issues one draw per
//! visible tile against a retained-mode surface. Grid lines and the hover
//! highlight are separate overlay layers that update without a full redraw.
//!
//! The drawing backend is abstracted behind [`RenderSurface`] and
//! [`TextureUploader`]; [`raster`] provides an in-memory implementation of
//! both.

pub mod cache;
pub mod config;
pub mod controller;
pub mod culler;
pub mod decode;
pub mod engine;
pub mod error;
pub mod grid;
pub mod loader;
pub mod overlay;
pub mod pipeline;
pub mod pool;
pub mod raster;
pub mod surface;
pub mod transform;

#[cfg(test)]
mod testing;

pub use config::{CollectStrategy, EngineConfig};
pub use decode::{ImageDecoder, TileDecoder};
pub use engine::{EngineInfo, TileEngine};
pub use error::{DecodeError, EngineError, UploadError};
pub use grid::{Grid, TextureId, Tile};
pub use pipeline::FrameStats;
pub use surface::{PixelBuffer, RenderSurface, Rgba, TextureHandle, TextureUploader};
