//! Featured-image recompression before upload.
//!
//! Telegram serves photos in whatever size the sender produced; WordPress
//! gets a bounded JPEG: downscaled to a maximum width and re-encoded at a
//! fixed quality.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::ImageReader;
use std::io::Cursor;

/// Decode an image, downscale it to at most `max_width` (never enlarging),
/// and re-encode as JPEG at the given quality.
///
/// # Errors
///
/// Returns an error when the bytes are not a decodable image or the encode
/// fails.
pub fn recompress_jpeg(bytes: &[u8], max_width: u32, quality: u8) -> Result<Vec<u8>> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("unrecognized image format")?
        .decode()
        .context("image decode failed")?;

    let img = if img.width() > max_width {
        img.resize(max_width, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .context("jpeg encode failed")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode fixture");
        buf
    }

    #[test]
    fn wide_images_are_downscaled() {
        let input = png_bytes(400, 100);
        let out = recompress_jpeg(&input, 200, 82).expect("recompress");
        let img = image::load_from_memory(&out).expect("decode output");
        assert_eq!(img.width(), 200);
        assert_eq!(img.height(), 50);
    }

    #[test]
    fn small_images_keep_their_size() {
        let input = png_bytes(100, 60);
        let out = recompress_jpeg(&input, 200, 82).expect("recompress");
        let img = image::load_from_memory(&out).expect("decode output");
        assert_eq!((img.width(), img.height()), (100, 60));
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(recompress_jpeg(b"not an image", 200, 82).is_err());
    }
}
