//! Fetch-and-decode of tile textures into RGBA8 pixel buffers.
//!
//! Decoders run on loader worker threads, so they must be `Send + Sync` and
//! must not touch the GPU.

use image::ImageError;

use crate::error::DecodeError;
use crate::grid::Tile;
use crate::surface::PixelBuffer;

pub trait TileDecoder: Send + Sync {
    fn decode(&self, tile: &Tile) -> Result<PixelBuffer, DecodeError>;
}

impl<F> TileDecoder for F
where
    F: Fn(&Tile) -> Result<PixelBuffer, DecodeError> + Send + Sync,
{
    fn decode(&self, tile: &Tile) -> Result<PixelBuffer, DecodeError> {
        self(tile)
    }
}

/// Reads the tile's source file with the `image` crate and converts it to
/// RGBA8 at native resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl TileDecoder for ImageDecoder {
    fn decode(&self, tile: &Tile) -> Result<PixelBuffer, DecodeError> {
        let path = &tile.source;
        if !path.exists() {
            return Err(DecodeError::Missing(path.clone()));
        }

        let img = image::open(path).map_err(|err| match err {
            ImageError::IoError(source) => DecodeError::Io {
                path: path.clone(),
                source,
            },
            source => DecodeError::Image {
                path: path.clone(),
                source,
            },
        })?;

        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(PixelBuffer {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn decodes_png_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stone.png");
        RgbImage::from_pixel(4, 2, Rgb([10, 20, 30])).save(&path).unwrap();

        let buf = ImageDecoder.decode(&Tile::new("stone", &path)).unwrap();
        assert_eq!((buf.width, buf.height), (4, 2));
        assert_eq!(buf.pixel(3, 1), [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageDecoder
            .decode(&Tile::new("gone", dir.path().join("gone.png")))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Missing(_)));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = ImageDecoder.decode(&Tile::new("junk", &path)).unwrap_err();
        assert!(matches!(err, DecodeError::Image { .. }));
    }
}
