//! The document abstraction the renderer draws pages from.

use crate::request::{ImageSize, RenderOptions};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Loading state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    NotLoaded,
    Loading,
    Ready,
    Error,
}

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel size at the given zoom factor, never smaller than 1x1.
    #[must_use]
    pub fn scaled(&self, zoom: f64) -> ImageSize {
        let width = (f64::from(self.width) * zoom).round().max(1.0) as u32;
        let height = (f64::from(self.height) * zoom).round().max(1.0) as u32;
        ImageSize::new(width, height)
    }
}

/// A paginated document that can rasterize its pages.
///
/// Implementations are shared with the render worker thread, so they must
/// be `Send + Sync`. `render` may block for as long as it needs; the
/// renderer never calls it concurrently.
pub trait Document: Send + Sync {
    /// Current loading state. Only `Ready` documents are rendered.
    fn status(&self) -> DocumentStatus;

    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Size of `page` in points, or `None` if the page does not exist.
    fn page_size(&self, page: usize) -> Option<PageSize>;

    /// Pixel size of `page` at `zoom` (1.0 renders one pixel per point).
    fn page_size_at_zoom(&self, page: usize, zoom: f64) -> Option<ImageSize> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return None;
        }
        self.page_size(page).map(|size| size.scaled(zoom))
    }

    /// Render `page` into a bitmap of `size` pixels.
    fn render(&self, page: usize, size: ImageSize, options: &RenderOptions)
        -> anyhow::Result<RgbaImage>;
}

/// Shared handle applications hold on to. The renderer only keeps a weak reference.
pub type SharedDocument = Arc<dyn Document>;

/// The renderer's non-owning view of the current document.
///
/// `generation` changes every time a different document is set, so work
/// dispatched against an older binding can be recognised on completion.
#[derive(Clone)]
pub(crate) struct DocumentBinding {
    document: Option<Weak<dyn Document>>,
    generation: u64,
}

impl DocumentBinding {
    pub(crate) fn empty() -> Self {
        Self {
            document: None,
            generation: 0,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Upgrade to a strong handle if the document is still alive.
    pub(crate) fn upgrade(&self) -> Option<SharedDocument> {
        self.document.as_ref().and_then(Weak::upgrade)
    }

    /// Whether `document` is the one already bound.
    pub(crate) fn is_bound_to(&self, document: Option<&SharedDocument>) -> bool {
        match (&self.document, document) {
            (None, None) => true,
            (Some(weak), Some(strong)) => {
                weak.as_ptr().cast::<()>() == Arc::as_ptr(strong).cast::<()>()
                    && weak.strong_count() > 0
            }
            _ => false,
        }
    }

    /// Rebind to `document`, starting a new generation.
    pub(crate) fn rebind(&mut self, document: Option<&SharedDocument>) {
        self.document = document.map(Arc::downgrade);
        self.generation += 1;
    }
}

impl std::fmt::Debug for DocumentBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBinding")
            .field("bound", &self.document.is_some())
            .field("alive", &self.upgrade().is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sheet {
        status: DocumentStatus,
    }

    impl Document for Sheet {
        fn status(&self) -> DocumentStatus {
            self.status
        }

        fn page_count(&self) -> usize {
            1
        }

        fn page_size(&self, page: usize) -> Option<PageSize> {
            (page == 0).then_some(PageSize::new(612.0, 792.0))
        }

        fn render(
            &self,
            _page: usize,
            size: ImageSize,
            _options: &RenderOptions,
        ) -> anyhow::Result<RgbaImage> {
            Ok(RgbaImage::new(size.width, size.height))
        }
    }

    fn sheet(status: DocumentStatus) -> SharedDocument {
        Arc::new(Sheet { status })
    }

    #[test]
    fn test_page_size_scaled() {
        let letter = PageSize::new(612.0, 792.0);
        assert_eq!(letter.scaled(1.0), ImageSize::new(612, 792));
        assert_eq!(letter.scaled(0.5), ImageSize::new(306, 396));
        assert_eq!(letter.scaled(0.0001), ImageSize::new(1, 1));
    }

    #[test]
    fn test_page_size_at_zoom_default_impl() {
        let doc = sheet(DocumentStatus::Ready);
        assert_eq!(doc.page_size_at_zoom(0, 2.0), Some(ImageSize::new(1224, 1584)));
        assert_eq!(doc.page_size_at_zoom(1, 2.0), None);
        assert_eq!(doc.page_size_at_zoom(0, 0.0), None);
        assert_eq!(doc.page_size_at_zoom(0, f64::NAN), None);
    }

    #[test]
    fn test_binding_rebind_bumps_generation() {
        let doc = sheet(DocumentStatus::Ready);
        let mut binding = DocumentBinding::empty();
        assert_eq!(binding.generation(), 0);
        assert!(binding.is_bound_to(None));

        binding.rebind(Some(&doc));
        assert_eq!(binding.generation(), 1);
        assert!(binding.is_bound_to(Some(&doc)));
        assert!(!binding.is_bound_to(None));

        let other = sheet(DocumentStatus::Ready);
        assert!(!binding.is_bound_to(Some(&other)));
    }

    #[test]
    fn test_binding_does_not_keep_document_alive() {
        let doc = sheet(DocumentStatus::Ready);
        let mut binding = DocumentBinding::empty();
        binding.rebind(Some(&doc));
        assert!(binding.upgrade().is_some());

        drop(doc);
        assert!(binding.upgrade().is_none());
        assert!(!binding.is_bound_to(None));
    }

    #[test]
    fn test_binding_upgrade_ignores_status() {
        let loading = sheet(DocumentStatus::Loading);
        let mut binding = DocumentBinding::empty();
        binding.rebind(Some(&loading));
        assert_eq!(
            binding.upgrade().map(|doc| doc.status()),
            Some(DocumentStatus::Loading)
        );
    }
}
