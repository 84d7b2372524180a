//! # page-renderer-core
//!
//! Asynchronous, de-duplicating page render scheduler.
//!
//! A [`PageRenderer`] turns "render page N at size S" requests into bitmaps:
//!
//! - Requests are identified by a monotonically increasing [`RequestId`]
//! - Equal requests (same page, size and options) that are still pending
//!   share one id and render once
//! - Pages render one at a time, in request order, either on the caller's
//!   thread or on a dedicated worker thread ([`RenderMode`])
//! - Results are published as [`RendererEvent`]s over async channels
//!
//! The renderer is backend-agnostic: anything implementing [`Document`] can be
//! rendered. With the `pdfium` feature, `PdfiumDocument` renders PDF files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use page_renderer_core::{PageRenderer, RenderMode, RendererConfig, SharedDocument};
//!
//! # fn open_document() -> SharedDocument { unimplemented!() }
//! fn main() -> anyhow::Result<()> {
//!     let renderer =
//!         PageRenderer::with_config(RendererConfig::with_render_mode(RenderMode::MultiThreaded))?;
//!     let events = renderer.subscribe();
//!
//!     let document = open_document();
//!     renderer.set_document(Some(&document));
//!
//!     let id = renderer.request_page(0, (800, 600));
//!     while let Ok(event) = events.recv_blocking() {
//!         if let Some(page) = event.into_page() {
//!             if page.request_id == id {
//!                 std::fs::write("page-1.png", page.to_png(1)?)?;
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Awaiting Rendered Pages
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use page_renderer_core::{PageRenderer, SharedDocument};
//!
//! # fn open_document() -> SharedDocument { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let renderer = PageRenderer::new();
//!     let pages = renderer.rendered_pages();
//!     futures::pin_mut!(pages);
//!
//!     let document = open_document();
//!     renderer.set_document(Some(&document));
//!     renderer.request_page(0, (400, 300));
//!
//!     if let Some(page) = pages.next().await {
//!         println!("Page {} rendered in {:?}", page.page, page.render_time);
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod encode;
pub mod error;
pub mod events;
pub mod renderer;
pub mod request;
pub mod stats;
pub mod worker;

mod queue;
mod scheduler;

#[cfg(feature = "pdfium")]
pub mod pdfium;

// Re-export main types for convenience
pub use cache::PageImageCache;
pub use config::{RenderMode, RendererConfig};
pub use document::{Document, DocumentStatus, PageSize, SharedDocument};
pub use encode::encode_png;
pub use error::{RendererError, Result};
pub use events::RendererEvent;
pub use renderer::PageRenderer;
pub use request::{
    ClipRect, ImageSize, Priority, RenderFlags, RenderOptions, RenderResult, RequestId,
    RequestKey, Rotation,
};
pub use scheduler::RendererState;
pub use stats::PerformanceStats;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumDocument;

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs; later
/// calls are ignored.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
