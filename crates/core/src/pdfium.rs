//! [`Document`] backed by pdfium (Google's PDF engine).
//!
//! Enabled with the `pdfium` cargo feature. The pdfium shared library is
//! looked up next to the executable, in `/usr/lib`, in `/usr/local/lib` and
//! finally on the system library path.

use crate::document::{Document, DocumentStatus, PageSize};
use crate::error::{RendererError, Result};
use crate::request::{ClipRect, ImageSize, RenderOptions, Rotation};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A PDF file opened with pdfium.
///
/// The file is read into memory once and its page sizes are cached. Each
/// render parses the in-memory bytes again, so no pdfium handle outlives a
/// single call.
pub struct PdfiumDocument {
    pdfium: Pdfium,
    path: PathBuf,
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

/// Bind to the pdfium library, trying the usual install locations first.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib"))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/usr/local/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| RendererError::Pdfium(format!("Failed to load pdfium library: {}", e)))?;
    Ok(Pdfium::new(bindings))
}

impl PdfiumDocument {
    /// Open `path`, binding to the pdfium library on the way.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(bind_pdfium()?, path)
    }

    /// Open `path` with an already bound pdfium instance.
    pub fn open_with(pdfium: Pdfium, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| {
            RendererError::Pdfium(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let page_sizes: Vec<PageSize> = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|e| RendererError::Pdfium(format!("Failed to load PDF: {}", e)))?;
            document
                .pages()
                .iter()
                .map(|page| PageSize::new(page.width().value, page.height().value))
                .collect()
        };

        info!(
            "Opened {} with {} pages",
            path.display(),
            page_sizes.len()
        );

        Ok(Self {
            pdfium,
            path,
            bytes,
            page_sizes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for PdfiumDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumDocument")
            .field("path", &self.path)
            .field("pages", &self.page_sizes.len())
            .finish()
    }
}

fn pdfium_rotation(rotation: Rotation) -> PdfPageRenderRotation {
    match rotation {
        Rotation::None => PdfPageRenderRotation::None,
        Rotation::Clockwise90 => PdfPageRenderRotation::Degrees90,
        Rotation::Clockwise180 => PdfPageRenderRotation::Degrees180,
        Rotation::Clockwise270 => PdfPageRenderRotation::Degrees270,
    }
}

/// Target size in the signed pixel units pdfium expects.
fn pixel_dimensions(size: ImageSize) -> anyhow::Result<(i32, i32)> {
    match (i32::try_from(size.width), i32::try_from(size.height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => anyhow::bail!("render size {} is too large", size),
    }
}

/// Cut `clip` out of `image`, clamped to the image bounds.
fn crop_to_clip(image: &RgbaImage, clip: ClipRect) -> RgbaImage {
    let x = clip.x.max(0) as u32;
    let y = clip.y.max(0) as u32;
    let width = clip.width.min(image.width().saturating_sub(x));
    let height = clip.height.min(image.height().saturating_sub(y));
    image::imageops::crop_imm(image, x, y, width, height).to_image()
}

impl Document for PdfiumDocument {
    fn status(&self) -> DocumentStatus {
        DocumentStatus::Ready
    }

    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, page: usize) -> Option<PageSize> {
        self.page_sizes.get(page).copied()
    }

    fn render(
        &self,
        page: usize,
        size: ImageSize,
        options: &RenderOptions,
    ) -> anyhow::Result<RgbaImage> {
        if page >= self.page_sizes.len() {
            anyhow::bail!("page {} out of range ({} pages)", page, self.page_sizes.len());
        }

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| anyhow::anyhow!("Failed to load PDF: {}", e))?;
        let index = u16::try_from(page)
            .map_err(|_| anyhow::anyhow!("page {} is beyond pdfium's page index range", page))?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|e| anyhow::anyhow!("Failed to get page {}: {}", page + 1, e))?;

        // A clip is taken from the page scaled to `scaled_size`.
        let target = match options.scaled_clip_rect {
            Some(_) => options.scaled_size.unwrap_or(size),
            None => size,
        };
        let (width, height) = pixel_dimensions(target)?;
        let flags = options.flags;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height)
            .rotate(pdfium_rotation(options.rotation), false)
            .render_annotations(flags.annotations)
            .use_lcd_text_rendering(flags.optimized_for_lcd)
            .use_grayscale_rendering(flags.grayscale)
            .force_half_tone(flags.force_halftone)
            .set_text_smoothing(!flags.text_aliased)
            .set_image_smoothing(!flags.image_aliased)
            .set_path_smoothing(!flags.path_aliased);

        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| anyhow::anyhow!("Failed to render page {}: {}", page + 1, e))?;
        let image: RgbaImage = bitmap.as_image().into_rgba8();

        debug!(
            "pdfium rendered page {} of {} at {}x{}",
            page,
            self.path.display(),
            image.width(),
            image.height()
        );

        Ok(match options.scaled_clip_rect {
            Some(clip) => crop_to_clip(&image, clip),
            None => image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_to_clip_inside_bounds() {
        let mut image = RgbaImage::new(10, 10);
        image.put_pixel(3, 4, Rgba([1, 2, 3, 4]));

        let cropped = crop_to_clip(
            &image,
            ClipRect {
                x: 2,
                y: 3,
                width: 4,
                height: 4,
            },
        );

        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(1, 1), &Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_crop_to_clip_clamps_to_bounds() {
        let image = RgbaImage::new(10, 10);
        let cropped = crop_to_clip(
            &image,
            ClipRect {
                x: -5,
                y: 8,
                width: 20,
                height: 20,
            },
        );
        assert_eq!(cropped.dimensions(), (10, 2));
    }

    #[test]
    fn test_pixel_dimensions_reject_overflow() {
        assert_eq!(pixel_dimensions(ImageSize::new(800, 600)).unwrap(), (800, 600));
        assert!(pixel_dimensions(ImageSize::new(u32::MAX, 600)).is_err());
        assert!(pixel_dimensions(ImageSize::new(800, i32::MAX as u32 + 1)).is_err());
    }

    #[test]
    fn test_pdfium_document_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfiumDocument>();
    }

    #[test]
    fn test_rotation_mapping() {
        assert!(matches!(
            pdfium_rotation(Rotation::Clockwise270),
            PdfPageRenderRotation::Degrees270
        ));
    }

    #[test]
    fn test_open_missing_file_fails() {
        // Binding may fail on machines without pdfium; either way this errors.
        assert!(PdfiumDocument::open("/nonexistent/file.pdf").is_err());
    }
}
