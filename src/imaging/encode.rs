//! PNG and base64 helpers shared by the pipeline, histogram and CAPTCHA.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat};

use super::ImagingError;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ImagingError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Decode image bytes, guessing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
    image::load_from_memory(bytes)
        .map_err(|e| ImagingError::Decode(format!("Failed to decode image: {e}")))
}

/// Standard (padded) base64, as embedded in `data:image/png;base64,` URLs.
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn from_base64(encoded: &str) -> Result<Vec<u8>, ImagingError> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ImagingError::Decode(format!("Invalid base64: {e}")))
}
