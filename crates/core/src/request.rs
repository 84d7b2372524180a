//! Render request and result types.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifier handed out for every admitted render request.
///
/// Ids start at 1 and grow monotonically per renderer. `0` is reserved for
/// requests that were rejected because no ready document was set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Returned for requests that were not admitted.
    pub const REJECTED: RequestId = RequestId(0);

    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Whether the request was rejected at admission.
    #[must_use]
    pub const fn is_rejected(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Target bitmap size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Request priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Clockwise page rotation applied while rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    /// Rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    #[must_use]
    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::Clockwise270)
    }
}

/// Rasterization flags forwarded to the document backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderFlags {
    /// Draw annotations.
    pub annotations: bool,
    pub optimized_for_lcd: bool,
    pub grayscale: bool,
    pub force_halftone: bool,
    pub text_aliased: bool,
    pub image_aliased: bool,
    pub path_aliased: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            annotations: true,
            optimized_for_lcd: false,
            grayscale: false,
            force_halftone: false,
            text_aliased: false,
            image_aliased: false,
            path_aliased: false,
        }
    }
}

/// Sub-rectangle of a scaled page, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Options that shape a single render. Part of the de-duplication key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderOptions {
    pub rotation: Rotation,
    pub flags: RenderFlags,
    /// Render only this part of the page, after scaling the page to `scaled_size`.
    pub scaled_clip_rect: Option<ClipRect>,
    pub scaled_size: Option<ImageSize>,
}

impl RenderOptions {
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_clip(mut self, clip: ClipRect, scaled_size: ImageSize) -> Self {
        self.scaled_clip_rect = Some(clip);
        self.scaled_size = Some(scaled_size);
        self
    }
}

/// Key under which pending requests are de-duplicated and completions matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub page: usize,
    pub size: ImageSize,
    pub options: RenderOptions,
}

impl RequestKey {
    #[must_use]
    pub const fn new(page: usize, size: ImageSize, options: RenderOptions) -> Self {
        Self {
            page,
            size,
            options,
        }
    }
}

/// An admitted request, queued or in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub id: RequestId,
    pub key: RequestKey,
    pub priority: Priority,
}

/// A finished render, delivered through [`RendererEvent::PageRendered`](crate::RendererEvent).
#[derive(Clone, Debug)]
pub struct RenderResult {
    pub page: usize,
    pub size: ImageSize,
    pub image: Arc<RgbaImage>,
    pub options: RenderOptions,
    pub request_id: RequestId,
    /// Wall-clock time spent inside the document's render call.
    pub render_time: Duration,
}

impl RenderResult {
    /// Key this result completes.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.page, self.size, self.options)
    }

    /// Encode the rendered bitmap as PNG.
    pub fn to_png(&self, compression: u8) -> crate::Result<Vec<u8>> {
        crate::encode::encode_png(&self.image, compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_id_rejected_sentinel() {
        assert!(RequestId::REJECTED.is_rejected());
        assert!(!RequestId::new(1).is_rejected());
        assert_eq!(RequestId::default(), RequestId::REJECTED);
        assert_eq!(RequestId::new(7).to_string(), "#7");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::None.degrees(), 0);
        assert_eq!(Rotation::Clockwise270.degrees(), 270);
        assert!(Rotation::Clockwise90.is_quarter_turn());
        assert!(!Rotation::Clockwise180.is_quarter_turn());
    }

    #[test]
    fn test_image_size_from_tuple() {
        let size: ImageSize = (100, 50).into();
        assert_eq!(size, ImageSize::new(100, 50));
        assert_eq!(size.to_string(), "100x50");
        assert!(ImageSize::new(0, 10).is_empty());
    }

    #[test]
    fn test_request_key_distinguishes_options() {
        let size = ImageSize::new(100, 100);
        let plain = RequestKey::new(0, size, RenderOptions::default());
        let rotated = RequestKey::new(
            0,
            size,
            RenderOptions::default().with_rotation(Rotation::Clockwise90),
        );
        let no_annotations = RequestKey::new(
            0,
            size,
            RenderOptions::default().with_flags(RenderFlags {
                annotations: false,
                ..RenderFlags::default()
            }),
        );

        let keys: HashSet<_> = [plain, rotated, no_annotations, plain].into_iter().collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_render_result_key_round_trips_fields() {
        let options = RenderOptions::default().with_clip(
            ClipRect {
                x: 10,
                y: 20,
                width: 30,
                height: 40,
            },
            ImageSize::new(600, 800),
        );
        let result = RenderResult {
            page: 2,
            size: ImageSize::new(30, 40),
            image: Arc::new(RgbaImage::new(30, 40)),
            options,
            request_id: RequestId::new(5),
            render_time: Duration::from_millis(3),
        };
        assert_eq!(
            result.key(),
            RequestKey::new(2, ImageSize::new(30, 40), options)
        );
    }
}
