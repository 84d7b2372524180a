//! The public page renderer.
//!
//! [`PageRenderer`] collects render requests in a queue and processes it
//! either on the calling thread ([`RenderMode::SingleThreaded`]) or on a
//! dedicated worker thread ([`RenderMode::MultiThreaded`]). Each finished
//! render is published as [`RendererEvent::PageRendered`] to every subscriber.

use crate::cache::PageImageCache;
use crate::config::{RenderMode, RendererConfig};
use crate::document::SharedDocument;
use crate::error::Result;
use crate::events::RendererEvent;
use crate::request::{ImageSize, Priority, RenderOptions, RenderResult, RequestId};
use crate::scheduler::{Pumper, RendererState, Scheduler};
use crate::stats::PerformanceStats;
use crate::worker::WorkerThread;
use async_channel::Receiver;
use futures::{future, Stream, StreamExt};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Renders document pages to bitmaps, asynchronously and without duplicate work.
///
/// Requests for the same page, size and options that are still pending share
/// one request id and produce one completion event. Dropping the renderer
/// stops and joins its worker thread; requests that never started are
/// abandoned.
#[derive(Debug)]
pub struct PageRenderer {
    scheduler: Scheduler,
    config: RendererConfig,
    /// Held for the whole duration of a mode switch.
    worker: Mutex<Option<WorkerThread>>,
}

impl PageRenderer {
    /// Create a single-threaded renderer with the default configuration.
    pub fn new() -> Self {
        Self::unstarted(RendererConfig::default())
    }

    /// Create a renderer from `config`, starting the worker thread if the
    /// config asks for multi-threaded rendering.
    pub fn with_config(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let mode = config.render_mode;
        let renderer = Self::unstarted(config);
        if mode == RenderMode::MultiThreaded {
            renderer.switch_mode(mode)?;
        }
        info!("Page renderer initialized in {:?} mode", mode);
        Ok(renderer)
    }

    fn unstarted(config: RendererConfig) -> Self {
        Self {
            scheduler: Scheduler::new(&config),
            config,
            worker: Mutex::new(None),
        }
    }

    /// The configuration this renderer was built with.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The document pages are rendered from, if one is set and still alive.
    pub fn document(&self) -> Option<SharedDocument> {
        self.scheduler.document()
    }

    /// Set the document pages are rendered from.
    ///
    /// The renderer keeps only a weak reference. Pending requests are not
    /// cancelled: queued ones render against the new document, and a render
    /// already in flight finishes against the old one.
    pub fn set_document(&self, document: Option<&SharedDocument>) {
        if self.scheduler.set_document(document) {
            info!(
                "Renderer document {}",
                if document.is_some() { "set" } else { "cleared" }
            );
            self.scheduler.publish(RendererEvent::DocumentChanged);
        }
    }

    /// Request `page` rendered at `size` with default options and priority.
    ///
    /// Returns the request id, the id of an equal request that is still
    /// pending, or [`RequestId::REJECTED`] if no ready document is set.
    pub fn request_page(&self, page: usize, size: impl Into<ImageSize>) -> RequestId {
        self.request_page_with(page, size, RenderOptions::default(), Priority::Normal)
    }

    /// Request `page` rendered at `size` with explicit options and priority.
    pub fn request_page_with(
        &self,
        page: usize,
        size: impl Into<ImageSize>,
        options: RenderOptions,
        priority: Priority,
    ) -> RequestId {
        self.scheduler.enqueue(page, size.into(), options, priority)
    }

    /// Request `page` rendered at `zoom` times its size in points.
    ///
    /// Rejected when the document cannot report the page's size.
    pub fn request_page_at_zoom(
        &self,
        page: usize,
        zoom: f64,
        options: RenderOptions,
        priority: Priority,
    ) -> RequestId {
        self.scheduler.enqueue_at_zoom(page, zoom, options, priority)
    }

    /// Current render mode.
    pub fn render_mode(&self) -> RenderMode {
        self.scheduler.mode()
    }

    /// Switch between rendering on the calling thread and on a worker thread.
    ///
    /// Leaving multi-threaded mode waits for the in-flight render, joins the
    /// worker and renders anything still queued on the calling thread, so no
    /// request is lost or rendered twice.
    pub fn set_render_mode(&self, mode: RenderMode) -> Result<()> {
        if self.switch_mode(mode)? {
            self.scheduler.publish(RendererEvent::RenderModeChanged(mode));
        }
        Ok(())
    }

    fn switch_mode(&self, mode: RenderMode) -> Result<bool> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.scheduler.mode() == mode {
            return Ok(false);
        }

        match mode {
            RenderMode::MultiThreaded => {
                self.scheduler.set_mode(mode);
                match WorkerThread::start(&self.scheduler, &self.config.worker_thread_name) {
                    Ok(thread) => *worker = Some(thread),
                    Err(e) => {
                        self.scheduler.set_mode(RenderMode::SingleThreaded);
                        self.scheduler.pump(Pumper::Caller);
                        return Err(e);
                    }
                }
            }
            RenderMode::SingleThreaded => {
                if let Some(thread) = worker.take() {
                    thread.stop_and_join(&self.scheduler);
                }
                self.scheduler.set_mode(mode);
                let pending = self.scheduler.pending_len();
                if pending > 0 {
                    debug!("Rendering {} requests left by the worker", pending);
                }
                self.scheduler.pump(Pumper::Caller);
            }
        }

        info!("Render mode switched to {:?}", mode);
        Ok(true)
    }

    /// Receive every event published from now on.
    ///
    /// The receiver can be drained synchronously (`try_recv`,
    /// `recv_blocking`) or awaited; it also implements `futures::Stream`.
    pub fn subscribe(&self) -> Receiver<RendererEvent> {
        self.scheduler.subscribe()
    }

    /// Stream of rendered pages only, skipping the other events.
    pub fn rendered_pages(&self) -> impl Stream<Item = RenderResult> + Send + 'static {
        self.subscribe()
            .filter_map(|event| future::ready(event.into_page()))
    }

    pub fn state(&self) -> RendererState {
        self.scheduler.state()
    }

    /// Number of requests queued or rendering.
    pub fn pending_requests(&self) -> usize {
        self.scheduler.pending_len()
    }

    /// Snapshot of the render timing counters.
    pub fn stats(&self) -> PerformanceStats {
        self.scheduler.stats()
    }

    pub fn reset_stats(&self) {
        self.scheduler.reset_stats();
    }

    /// An empty page image cache sized from this renderer's config.
    pub fn new_page_cache(&self) -> PageImageCache {
        PageImageCache::new(self.config.cache_capacity)
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageRenderer {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = worker {
            thread.stop_and_join(&self.scheduler);
        }
        let abandoned = self.scheduler.abandon_queued();
        if abandoned > 0 {
            debug!("Abandoned {} queued render requests", abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentStatus, PageSize};
    use image::RgbaImage;
    use std::sync::Arc;

    struct Blank;

    impl Document for Blank {
        fn status(&self) -> DocumentStatus {
            DocumentStatus::Ready
        }

        fn page_count(&self) -> usize {
            2
        }

        fn page_size(&self, page: usize) -> Option<PageSize> {
            (page < 2).then_some(PageSize::new(100.0, 100.0))
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

    #[test]
    fn test_default_values() {
        let renderer = PageRenderer::new();
        assert!(renderer.document().is_none());
        assert_eq!(renderer.render_mode(), RenderMode::SingleThreaded);
        assert_eq!(renderer.state(), RendererState::NoDocument);
        assert_eq!(renderer.pending_requests(), 0);
        assert_eq!(renderer.stats(), PerformanceStats::default());
    }

    #[test]
    fn test_with_config_rejects_invalid_config() {
        let config = RendererConfig::default().cache_capacity(0);
        assert!(PageRenderer::with_config(config).is_err());
    }

    #[test]
    fn test_with_config_starts_in_multi_threaded_mode() {
        let renderer =
            PageRenderer::with_config(RendererConfig::with_render_mode(RenderMode::MultiThreaded))
                .unwrap();
        assert_eq!(renderer.render_mode(), RenderMode::MultiThreaded);
    }

    #[test]
    fn test_set_document_publishes_change_once() {
        let renderer = PageRenderer::new();
        let events = renderer.subscribe();
        let doc: SharedDocument = Arc::new(Blank);

        renderer.set_document(Some(&doc));
        renderer.set_document(Some(&doc));

        assert!(matches!(events.try_recv(), Ok(RendererEvent::DocumentChanged)));
        assert!(events.try_recv().is_err());
        assert!(renderer.document().is_some());
        assert_eq!(renderer.state(), RendererState::Idle);
    }

    #[test]
    fn test_set_render_mode_publishes_change() {
        let renderer = PageRenderer::new();
        let events = renderer.subscribe();

        renderer.set_render_mode(RenderMode::MultiThreaded).unwrap();
        renderer.set_render_mode(RenderMode::MultiThreaded).unwrap();
        renderer.set_render_mode(RenderMode::SingleThreaded).unwrap();

        assert!(matches!(
            events.try_recv(),
            Ok(RendererEvent::RenderModeChanged(RenderMode::MultiThreaded))
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(RendererEvent::RenderModeChanged(RenderMode::SingleThreaded))
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_rendered_pages_skips_other_events() {
        use futures::StreamExt;

        let renderer = PageRenderer::new();
        let pages = renderer.rendered_pages();
        futures::pin_mut!(pages);
        let doc: SharedDocument = Arc::new(Blank);
        renderer.set_document(Some(&doc));

        let id = renderer.request_page(1, (8, 8));

        let page = tokio_test::block_on(pages.next()).unwrap();
        assert_eq!(page.request_id, id);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_new_page_cache_uses_config_capacity() {
        let renderer =
            PageRenderer::with_config(RendererConfig::default().cache_capacity(3)).unwrap();
        assert_eq!(renderer.new_page_cache().capacity(), 3);
    }

    #[test]
    fn test_renderer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PageRenderer>();
    }
}
