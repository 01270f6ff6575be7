//! Software implementation of the surface and upload contracts.
//!
//! [`RasterSurface`] keeps a retained display list, and [`rasterize`]
//! composites it into an RGBA image on demand. Textures live in a store shared
//! with the paired [`RasterUploader`].
//!
//! [`rasterize`]: RasterSurface::rasterize

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec2;
use image::RgbaImage;
use parking_lot::RwLock;

use crate::error::UploadError;
use crate::grid::TextureId;
use crate::surface::{ItemId, PixelBuffer, RectStyle, RenderSurface, Rgba, TextureHandle, TextureUploader};

pub const DEFAULT_BACKGROUND: Rgba = Rgba([45, 45, 48, 255]);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawItem {
    Image {
        texture: TextureHandle,
        min: Vec2,
        max: Vec2,
    },
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

#[derive(Debug, Default)]
struct TextureStore {
    next: u64,
    textures: HashMap<TextureHandle, PixelBuffer>,
}

type SharedStore = Arc<RwLock<TextureStore>>;

#[derive(Debug)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    attached: bool,
    background: Rgba,
    next_item: u64,
    /// Item ids are handed out in increasing order, so this is draw order.
    items: BTreeMap<ItemId, DrawItem>,
    store: SharedStore,
    clears: u64,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            attached: true,
            background: DEFAULT_BACKGROUND,
            next_item: 0,
            items: BTreeMap::new(),
            store: SharedStore::default(),
            clears: 0,
        }
    }

    /// An uploader whose handles this surface can draw.
    pub fn uploader(&self) -> RasterUploader {
        RasterUploader {
            store: Arc::clone(&self.store),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_background(&mut self, color: Rgba) {
        self.background = color;
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many times the surface was cleared.
    pub fn clears(&self) -> u64 {
        self.clears
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &DrawItem)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    pub fn item(&self, id: ItemId) -> Option<&DrawItem> {
        self.items.get(&id)
    }

    fn push(&mut self, item: DrawItem) -> ItemId {
        self.next_item += 1;
        let id = ItemId(self.next_item);
        self.items.insert(id, item);
        id
    }

    /// Composites the display list, in draw order, over the background.
    pub fn rasterize(&self) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, image::Rgba(self.background.0));
        let store = self.store.read();

        for item in self.items.values() {
            match item {
                DrawItem::Image { texture, min, max } => {
                    if let Some(pixels) = store.textures.get(texture) {
                        blit(&mut img, pixels, *min, *max);
                    }
                }
                DrawItem::Line { from, to, color, .. } => line(&mut img, *from, *to, *color),
                DrawItem::Rect { min, max, style } => rect(&mut img, *min, *max, *style),
            }
        }
        img
    }
}

impl RenderSurface for RasterSurface {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn clear(&mut self) {
        self.items.clear();
        self.clears += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn draw_image(&mut self, texture: TextureHandle, min: Vec2, max: Vec2) -> ItemId {
        self.push(DrawItem::Image { texture, min, max })
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Rgba, thickness: f32) -> ItemId {
        self.push(DrawItem::Line {
            from,
            to,
            color,
            thickness,
        })
    }

    fn draw_rect(&mut self, min: Vec2, max: Vec2, style: RectStyle) -> ItemId {
        self.push(DrawItem::Rect { min, max, style })
    }

    fn delete_item(&mut self, item: ItemId) {
        self.items.remove(&item);
    }

    fn item_exists(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }
}

/// Stores uploaded pixels in memory, shared with the surface it came from.
#[derive(Debug, Clone)]
pub struct RasterUploader {
    store: SharedStore,
}

impl RasterUploader {
    /// Number of live textures.
    pub fn len(&self) -> usize {
        self.store.read().textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TextureUploader for RasterUploader {
    fn create_handle(
        &mut self,
        id: &TextureId,
        pixels: &PixelBuffer,
    ) -> Result<TextureHandle, UploadError> {
        let expected = pixels.width as usize * pixels.height as usize * 4;
        if pixels.width == 0 || pixels.height == 0 || pixels.rgba.len() != expected {
            return Err(UploadError::BadDimensions(
                id.clone(),
                pixels.width,
                pixels.height,
            ));
        }

        let mut store = self.store.write();
        store.next += 1;
        let handle = TextureHandle(store.next);
        store.textures.insert(handle, pixels.clone());
        Ok(handle)
    }

    fn release(&mut self, handle: TextureHandle) {
        self.store.write().textures.remove(&handle);
    }
}

/// Pixels whose centre lies in `[lo, hi)`, clipped to `[0, limit)`.
fn span(lo: f32, hi: f32, limit: u32) -> std::ops::Range<u32> {
    let start = (lo - 0.5).ceil().max(0.0);
    let end = (hi - 0.5).ceil().clamp(0.0, limit as f32);
    start as u32..(end as u32).max(start as u32)
}

fn blend(dst: &mut image::Rgba<u8>, src: [u8; 4]) {
    let a = src[3] as f32 / 255.0;
    if a >= 1.0 {
        dst.0 = src;
        return;
    }
    for c in 0..3 {
        dst.0[c] = (src[c] as f32 * a + dst.0[c] as f32 * (1.0 - a)).round() as u8;
    }
    let da = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((a + da * (1.0 - a)) * 255.0).round() as u8;
}

/// Nearest-neighbour scaled copy of `pixels` into `[min, max)`.
fn blit(img: &mut RgbaImage, pixels: &PixelBuffer, min: Vec2, max: Vec2) {
    let size = max - min;
    if size.x <= 0.0 || size.y <= 0.0 {
        return;
    }
    let (w, h) = img.dimensions();
    for py in span(min.y, max.y, h) {
        let v = (((py as f32 + 0.5 - min.y) / size.y) * pixels.height as f32) as u32;
        let v = v.min(pixels.height - 1);
        for px in span(min.x, max.x, w) {
            let u = (((px as f32 + 0.5 - min.x) / size.x) * pixels.width as f32) as u32;
            let u = u.min(pixels.width - 1);
            blend(img.get_pixel_mut(px, py), pixels.pixel(u, v));
        }
    }
}

fn rect(img: &mut RgbaImage, min: Vec2, max: Vec2, style: RectStyle) {
    let (w, h) = img.dimensions();
    let t = style.thickness.max(1.0);
    for py in span(min.y, max.y, h) {
        let cy = py as f32 + 0.5;
        for px in span(min.x, max.x, w) {
            let cx = px as f32 + 0.5;
            let on_edge = cx - min.x < t || max.x - cx < t || cy - min.y < t || max.y - cy < t;
            if style.filled || on_edge {
                blend(img.get_pixel_mut(px, py), style.color.0);
            }
        }
    }
}

/// One pixel wide DDA line.
fn line(img: &mut RgbaImage, from: Vec2, to: Vec2, color: Rgba) {
    let (w, h) = img.dimensions();
    let delta = to - from;
    let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as u32;
    let mut last = None;
    for i in 0..=steps {
        let p = from + delta * (i as f32 / steps as f32);
        let (x, y) = (p.x.floor(), p.y.floor());
        if x < 0.0 || y < 0.0 || x >= w as f32 || y >= h as f32 {
            continue;
        }
        let at = (x as u32, y as u32);
        if last == Some(at) {
            continue;
        }
        last = Some(at);
        blend(img.get_pixel_mut(at.0, at.1), color.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba([255, 0, 0, 255]);

    #[test]
    fn display_list_tracks_items() {
        let mut surface = RasterSurface::new(32, 32);
        let a = surface.draw_rect(Vec2::ZERO, Vec2::splat(4.0), RectStyle::fill(RED));
        let b = surface.draw_line(Vec2::ZERO, Vec2::splat(8.0), RED, 1.0);
        assert!(surface.item_exists(a) && surface.item_exists(b));
        assert_ne!(a, b);

        surface.delete_item(a);
        assert!(!surface.item_exists(a));
        assert_eq!(surface.len(), 1);

        surface.clear();
        assert!(surface.is_empty());
        assert_eq!(surface.clears(), 1);
    }

    #[test]
    fn uploaded_textures_are_drawn_scaled() {
        let mut surface = RasterSurface::new(32, 32);
        let mut uploader = surface.uploader();

        let mut pixels = PixelBuffer::solid(2, 1, RED);
        pixels.rgba[4..8].copy_from_slice(&[0, 0, 255, 255]);
        let handle = uploader.create_handle(&"half".into(), &pixels).unwrap();
        surface.draw_image(handle, Vec2::ZERO, Vec2::splat(16.0));

        let img = surface.rasterize();
        assert_eq!(img.get_pixel(3, 10).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(12, 10).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(20, 20).0, DEFAULT_BACKGROUND.0);
    }

    #[test]
    fn released_textures_are_skipped() {
        let mut surface = RasterSurface::new(8, 8);
        let mut uploader = surface.uploader();
        let handle = uploader
            .create_handle(&"a".into(), &PixelBuffer::solid(1, 1, RED))
            .unwrap();
        surface.draw_image(handle, Vec2::ZERO, Vec2::splat(8.0));
        uploader.release(handle);
        assert!(uploader.is_empty());
        assert_eq!(surface.rasterize().get_pixel(4, 4).0, DEFAULT_BACKGROUND.0);
    }

    #[test]
    fn uploader_rejects_empty_buffers() {
        let mut uploader = RasterSurface::new(8, 8).uploader();
        let empty = PixelBuffer {
            width: 0,
            height: 4,
            rgba: Vec::new(),
        };
        let err = uploader.create_handle(&"e".into(), &empty).unwrap_err();
        assert!(matches!(err, UploadError::BadDimensions(_, 0, 4)));
    }

    #[test]
    fn outline_leaves_interior_alone() {
        let mut surface = RasterSurface::new(16, 16);
        surface.set_background(Rgba([0, 0, 0, 255]));
        surface.draw_rect(Vec2::ZERO, Vec2::splat(16.0), RectStyle::outline(RED, 2.0));
        let img = surface.rasterize();
        assert_eq!(img.get_pixel(0, 8).0, RED.0);
        assert_eq!(img.get_pixel(1, 8).0, RED.0);
        assert_eq!(img.get_pixel(8, 8).0, [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_fill_blends() {
        let mut surface = RasterSurface::new(4, 4);
        surface.set_background(Rgba([0, 0, 0, 255]));
        surface.draw_rect(Vec2::ZERO, Vec2::splat(4.0), RectStyle::fill(Rgba([200, 100, 0, 128])));
        let px = surface.rasterize().get_pixel(1, 1).0;
        assert_eq!(px, [100, 50, 0, 255]);
    }

    #[test]
    fn lines_are_clipped() {
        let mut surface = RasterSurface::new(8, 8);
        surface.set_background(Rgba([0, 0, 0, 255]));
        surface.draw_line(Vec2::new(-10.0, 2.0), Vec2::new(20.0, 2.0), RED, 1.0);
        let img = surface.rasterize();
        for x in 0..8 {
            assert_eq!(img.get_pixel(x, 2).0, RED.0);
        }
        assert_eq!(img.get_pixel(3, 3).0, [0, 0, 0, 255]);
    }
}
