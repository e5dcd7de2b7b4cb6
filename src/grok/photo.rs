//! Preparation of evidence photos before they are sent to the model.

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use super::error::GrokError;

/// Downscale and re-encode an image as JPEG.
///
/// The longest edge is capped at `max_edge`; aspect ratio is kept and small
/// images are never upscaled.
pub fn downscale_jpeg(bytes: &[u8], max_edge: u32, quality: u8) -> Result<Vec<u8>, GrokError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());

    let img = if width.max(height) > max_edge {
        tracing::debug!(width, height, max_edge, "downscaling evidence image");
        img.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out.into_inner())
}

/// Build the `data:` URL embedded in an `image_url` content part.
pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}
