//! Image encoding: rendered page → PNG bytes → base64 `ImageData`.
//!
//! PNG is lossless; JPEG artefacts around glyph edges measurably hurt OCR on
//! small print, so both the Tesseract and vision engines receive PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap PNG bytes as a base64 image attachment for a vision model.
///
/// `detail: "high"` keeps fine print legible on tiling providers; `"low"`
/// downsamples the whole page to a single 512 px tile.
pub fn to_image_data(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded page image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}
