//! Contracts with the drawing backend: the retained-mode render surface and
//! the GPU upload primitive.

use glam::Vec2;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::UploadError;
use crate::grid::TextureId;

/// 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn opaque(rgb: [u8; 3]) -> Self {
        Self([rgb[0], rgb[1], rgb[2], 255])
    }
}

/// Handle to an item previously drawn on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

/// Opaque GPU texture handle produced by a [`TextureUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectStyle {
    pub color: Rgba,
    /// Outline thickness in pixels; ignored when `filled`.
    pub thickness: f32,
    pub filled: bool,
}

impl RectStyle {
    pub fn outline(color: Rgba, thickness: f32) -> Self {
        Self {
            color,
            thickness,
            filled: false,
        }
    }

    pub fn fill(color: Rgba) -> Self {
        Self {
            color,
            thickness: 0.0,
            filled: true,
        }
    }
}

/// Decoded, tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        (rgba.len() == width as usize * height as usize * 4).then_some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        let rgba = color.0.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            rgba,
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.rgba)
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels()[(y * self.width + x) as usize]
    }
}

/// A retained-mode drawing target.
///
/// Every draw call returns an [`ItemId`] that stays valid until the item is
/// deleted or the surface is cleared.
pub trait RenderSurface {
    /// Whether the surface can currently accept draw calls.
    fn is_attached(&self) -> bool;
    /// Removes every drawn item.
    fn clear(&mut self);
    /// Backends that own their pixel size follow the viewport here.
    fn resize(&mut self, _width: u32, _height: u32) {}
    fn draw_image(&mut self, texture: TextureHandle, min: Vec2, max: Vec2) -> ItemId;
    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Rgba, thickness: f32) -> ItemId;
    fn draw_rect(&mut self, min: Vec2, max: Vec2, style: RectStyle) -> ItemId;
    fn delete_item(&mut self, item: ItemId);
    fn item_exists(&self, item: ItemId) -> bool;
}

/// Turns decoded pixels into GPU textures. Not safe for concurrent calls.
pub trait TextureUploader {
    fn create_handle(
        &mut self,
        id: &TextureId,
        pixels: &PixelBuffer,
    ) -> Result<TextureHandle, UploadError>;

    fn release(&mut self, handle: TextureHandle);
}

/// Serializes handle creation. The lock is held for exactly one
/// [`TextureUploader::create_handle`] call and never around I/O or decoding.
#[derive(Debug, Default)]
pub struct UploadGate {
    lock: Mutex<()>,
}

impl UploadGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_handle<U: TextureUploader + ?Sized>(
        &self,
        uploader: &mut U,
        id: &TextureId,
        pixels: &PixelBuffer,
    ) -> Result<TextureHandle, UploadError> {
        let _guard = self.lock.lock();
        uploader.create_handle(id, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_checks_length() {
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_some());
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn solid_buffer_pixels() {
        let buf = PixelBuffer::solid(3, 2, Rgba([1, 2, 3, 4]));
        assert_eq!(buf.pixels().len(), 6);
        assert_eq!(buf.pixel(2, 1), [1, 2, 3, 4]);
    }
}
