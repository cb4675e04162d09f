//! Image encoding: captured bitmap → bytes embeddable in the output document.
//!
//! PDF pages embed JPEG directly as a `DCTDecode` image XObject, so no
//! re-compression happens inside the PDF writer. Slides embed PNG: lossless
//! keeps text in screenshots crisp, and PowerPoint handles it natively.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a capture as baseline JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(img)?;
    debug!("Encoded {}x{} capture → {} bytes JPEG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode a capture as PNG.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} capture → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encode_small_jpeg() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let data = encode_jpeg(&img, 90).expect("encode should succeed");
        // SOI marker
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encode_small_png() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 255]));
        let data = encode_png(&img).expect("encode should succeed");
        assert_eq!(&data[1..4], b"PNG");
        let back = image::load_from_memory(&data).expect("valid png");
        assert_eq!((back.width(), back.height()), (10, 10));
    }
}
