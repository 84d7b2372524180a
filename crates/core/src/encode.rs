//! PNG encoding of rendered pages.

use crate::error::{RendererError, Result};
use image::RgbaImage;
use std::io::Cursor;

/// Map a zlib-style level (0-9) onto the encoder's presets.
fn compression_for(level: u8) -> png::Compression {
    match level {
        0..=2 => png::Compression::Fast,
        3..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    }
}

/// Encode an RGBA bitmap as an 8-bit RGBA PNG.
///
/// `compression` is a level from 0 (fastest) to 9 (smallest); values above
/// 9 are treated as 9.
pub fn encode_png(image: &RgbaImage, compression: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let mut encoder = png::Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(compression_for(compression));

    let mut writer = encoder
        .write_header()
        .map_err(|e| RendererError::PngEncoding(format!("Failed to write PNG header: {}", e)))?;

    writer
        .write_image_data(image.as_raw())
        .map_err(|e| RendererError::PngEncoding(format!("Failed to write PNG data: {}", e)))?;

    drop(writer);

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_png_writes_signature() {
        let image = RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 255]));
        let data = encode_png(&image, 1).unwrap();
        assert_eq!(&data[..8], &PNG_MAGIC);
    }

    #[test]
    fn test_encoded_png_decodes_to_same_pixels() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, Rgba([10, 20, 30, 40]));

        let data = encode_png(&image, 9).unwrap();
        let decoded = image::load_from_memory(&data).unwrap().into_rgba8();

        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn test_compression_levels() {
        assert!(matches!(compression_for(0), png::Compression::Fast));
        assert!(matches!(compression_for(5), png::Compression::Default));
        assert!(matches!(compression_for(9), png::Compression::Best));
        assert!(matches!(compression_for(200), png::Compression::Best));
    }
}
