//! LRU cache of rendered page images.
//!
//! The renderer itself keeps no bitmaps. Views that repaint often keep the
//! most recent results here and only call `request_page` on a miss.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;

use crate::events::RendererEvent;
use crate::request::{ImageSize, RenderOptions, RequestKey};

/// LRU cache for rendered page images, keyed like render requests.
#[derive(Debug)]
pub struct PageImageCache {
    cache: LruCache<RequestKey, Arc<RgbaImage>>,
}

impl PageImageCache {
    /// Create a new cache with the given capacity (at least one entry).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached image, promoting it in the LRU order.
    pub fn get(&mut self, key: &RequestKey) -> Option<Arc<RgbaImage>> {
        self.cache.get(key).cloned()
    }

    /// Get the image for `page` at `size` rendered with `options`.
    pub fn get_page(
        &mut self,
        page: usize,
        size: ImageSize,
        options: &RenderOptions,
    ) -> Option<Arc<RgbaImage>> {
        self.get(&RequestKey::new(page, size, *options))
    }

    /// Check if a key is in the cache without promoting it.
    #[must_use]
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert an image, evicting the least recently used one when full.
    pub fn insert(&mut self, key: RequestKey, image: Arc<RgbaImage>) {
        self.cache.put(key, image);
    }

    /// Update the cache from a renderer event.
    ///
    /// Rendered pages are inserted; a document change empties the cache.
    /// Returns `true` if the cache changed.
    pub fn absorb(&mut self, event: &RendererEvent) -> bool {
        match event {
            RendererEvent::PageRendered(result) => {
                self.insert(result.key(), Arc::clone(&result.image));
                true
            }
            RendererEvent::DocumentChanged => {
                let had_entries = !self.cache.is_empty();
                self.invalidate_all();
                had_entries
            }
            RendererEvent::RenderModeChanged(_) => false,
        }
    }

    /// Clear all cached pages.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Invalidate all cached versions of a specific page.
    pub fn invalidate_page(&mut self, page: usize) {
        let keys_to_remove: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| *k)
            .collect();

        for key in keys_to_remove {
            self.cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
