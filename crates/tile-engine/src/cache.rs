//! Texture residency: which texture ids already have a GPU handle.

use std::collections::HashMap;

use crate::grid::TextureId;
use crate::surface::{TextureHandle, TextureUploader};

/// A GPU handle plus the pixel size of the source it was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidentTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Load-once, reuse-forever map from texture id to GPU handle.
///
/// Entries are never evicted; ids that are no longer part of the current grid
/// stay resident until [`teardown`](Self::teardown).
#[derive(Debug, Default)]
pub struct TextureResidencyCache {
    entries: HashMap<TextureId, ResidentTexture>,
}

impl TextureResidencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, id: &TextureId) -> Option<ResidentTexture> {
        self.entries.get(id).copied()
    }

    #[inline]
    pub fn contains(&self, id: &TextureId) -> bool {
        self.entries.contains_key(id)
    }

    /// Last writer wins. The replaced entry, if any, is returned so the caller
    /// can release its handle.
    pub fn insert(&mut self, id: TextureId, texture: ResidentTexture) -> Option<ResidentTexture> {
        match self.entries.insert(id, texture) {
            Some(old) if old.handle != texture.handle => Some(old),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TextureId> {
        self.entries.keys()
    }

    /// Releases every handle through `uploader` and empties the cache.
    /// Returns how many handles were released.
    pub fn teardown<U: TextureUploader + ?Sized>(&mut self, uploader: &mut U) -> usize {
        let released = self.entries.len();
        for (_, texture) in self.entries.drain() {
            uploader.release(texture.handle);
        }
        if released > 0 {
            log::debug!("Released {} resident textures", released);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::surface::PixelBuffer;

    #[derive(Default)]
    struct Releases(Vec<TextureHandle>);

    impl TextureUploader for Releases {
        fn create_handle(
            &mut self,
            id: &TextureId,
            _pixels: &PixelBuffer,
        ) -> Result<TextureHandle, UploadError> {
            Err(UploadError::Rejected(id.clone(), "unused".into()))
        }

        fn release(&mut self, handle: TextureHandle) {
            self.0.push(handle);
        }
    }

    fn resident(n: u64) -> ResidentTexture {
        ResidentTexture {
            handle: TextureHandle(n),
            width: 16,
            height: 16,
        }
    }

    #[test]
    fn starts_empty_and_returns_inserted_handles() {
        let mut cache = TextureResidencyCache::new();
        let id = TextureId::from("stone");
        assert!(cache.get(&id).is_none());

        assert!(cache.insert(id.clone(), resident(1)).is_none());
        assert_eq!(cache.get(&id), Some(resident(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_is_idempotent_and_last_writer_wins() {
        let mut cache = TextureResidencyCache::new();
        let id = TextureId::from("stone");
        cache.insert(id.clone(), resident(1));
        assert!(cache.insert(id.clone(), resident(1)).is_none());
        assert_eq!(cache.insert(id.clone(), resident(2)), Some(resident(1)));
        assert_eq!(cache.get(&id).unwrap().handle, TextureHandle(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut cache = TextureResidencyCache::new();
        cache.insert("a".into(), resident(1));
        cache.insert("b".into(), resident(2));

        let mut uploader = Releases::default();
        assert_eq!(cache.teardown(&mut uploader), 2);
        assert!(cache.is_empty());

        uploader.0.sort_by_key(|h| h.0);
        assert_eq!(uploader.0, vec![TextureHandle(1), TextureHandle(2)]);
    }
}
