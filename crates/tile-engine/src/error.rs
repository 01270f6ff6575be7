//! Error types for the tile engine.
//!
//! Only construction-time problems (bad grids, bad configuration, a loader
//! pool that cannot start) surface as [`EngineError`]. Per-tile failures are
//! [`DecodeError`] / [`UploadError`] values that the pipeline logs and turns
//! into placeholder draws.

use std::path::PathBuf;

use crate::grid::TextureId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("grid is {width}x{height} but {len} tiles were supplied")]
    GridShape {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to start loader pool: {0}")]
    LoaderPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("texture source {0} does not exist")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no pixels available for texture {0}")]
    Unavailable(TextureId),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("pixel buffer for {0} is {1}x{2}, which the uploader cannot hold")]
    BadDimensions(TextureId, u32, u32),

    #[error("uploader rejected texture {0}: {1}")]
    Rejected(TextureId, String),
}
