//! In-process cache collaborators.
//!
//! Both caches are internally synchronized and safe to share between
//! admission calls and completion callbacks.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use log::debug;

use crate::{
    core::{CachedImage, DiskCache, MemoryCache},
    options::{CacheKey, Size},
};

/// Decoded image bytes with a release flag.
pub struct DecodedImage {
    pixels: Bytes,
    size: Size,
    mime_type: String,
    released: AtomicBool,
}

impl DecodedImage {
    pub fn new(pixels: Bytes, size: Size, mime_type: impl Into<String>) -> Self {
        Self {
            pixels,
            size,
            mime_type: mime_type.into(),
            released: AtomicBool::new(false),
        }
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Mark the pixels as recycled. Caches evict released entries on lookup.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.pixels.len())
            .field("released", &self.is_released())
            .finish()
    }
}

impl CachedImage for DecodedImage {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn info(&self) -> String {
        format!(
            "{}, {}, {} bytes",
            self.mime_type,
            self.size,
            self.pixels.len()
        )
    }

    fn mime_type(&self) -> Option<&str> {
        Some(&self.mime_type)
    }
}

/// DashMap-backed memory cache keyed by [`CacheKey`].
#[derive(Default)]
pub struct MemoryImageCache {
    entries: DashMap<CacheKey, Arc<dyn CachedImage>>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl MemoryCache for MemoryImageCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: CacheKey, image: Arc<dyn CachedImage>) {
        debug!("Caching image in memory: {key}");
        self.entries.insert(key, image);
    }

    fn remove(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>> {
        self.entries.remove(key).map(|(_, image)| image)
    }
}

/// Index of URIs whose bytes are already persisted on disk.
#[derive(Default)]
pub struct DiskCacheIndex {
    uris: DashSet<String>,
}

impl DiskCacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>) {
        self.uris.insert(uri.into());
    }

    pub fn remove(&self, uri: &str) -> bool {
        self.uris.remove(uri).is_some()
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

impl DiskCache for DiskCacheIndex {
    fn has(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<DecodedImage> {
        Arc::new(DecodedImage::new(
            Bytes::from_static(b"\x00\x01\x02\x03"),
            Size::new(1, 1),
            "image/png",
        ))
    }

    #[test]
    fn test_memory_cache_operations() {
        let cache = MemoryImageCache::new();
        let key = CacheKey::from("k");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), image());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap().mime_type(), Some("image/png"));

        assert!(cache.remove(&key).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_is_visible_through_cache() {
        let cache = MemoryImageCache::new();
        let decoded = image();
        cache.put(CacheKey::from("k"), decoded.clone());

        decoded.release();

        assert!(cache.get(&CacheKey::from("k")).unwrap().is_released());
        assert!(decoded.info().contains("4 bytes"));
    }

    #[test]
    fn test_disk_index() {
        let index = DiskCacheIndex::new();
        assert!(!index.has("http://a/b.png"));
        index.insert("http://a/b.png");
        assert!(index.has("http://a/b.png"));
        assert!(index.remove("http://a/b.png"));
        assert!(!index.has("http://a/b.png"));
    }
}
