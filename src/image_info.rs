//! Checks that screenshot bytes are a complete, decodable PNG.

use anyhow::{Context, Result};
use image::ImageFormat;

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Decodes `bytes` as a PNG and returns its pixel size.
///
/// The whole image is decoded, so a file with a valid header but missing or
/// corrupt pixel data is rejected.
pub fn png_size(bytes: &[u8]) -> Result<ImageSize> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .context("Screenshot is not a decodable PNG")?;
    Ok(ImageSize {
        width: img.width(),
        height: img.height(),
    })
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([43, 88, 118, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_size() {
        assert_eq!(
            png_size(&encode_png(80, 200)).unwrap(),
            ImageSize {
                width: 80,
                height: 200
            }
        );
    }

    #[test]
    fn rejects_header_without_pixel_data() {
        let png = encode_png(800, 2000);
        // Signature plus IHDR length, type and size: no IDAT, no IEND.
        assert!(png_size(&png[..24]).is_err());
    }

    #[test]
    fn rejects_truncated_pixel_data() {
        let png = encode_png(64, 64);
        assert!(png_size(&png[..png.len() - 20]).is_err());
    }

    #[test]
    fn rejects_non_png() {
        assert!(png_size(b"\xff\xd8\xff\xe0 not a png at all, just jpeg-ish").is_err());
    }
}
