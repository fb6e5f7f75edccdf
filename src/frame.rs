//! Camera-frame decoding: base64 payload (with or without a data-URL
//! header) to an RGB image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use thiserror::Error;

/// Input-side decode failures; both map to a 400 at the request boundary.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a base64-encoded camera frame.
///
/// Browser clients send `canvas.toDataURL()` output, so a `data:...;base64,`
/// header may precede the payload; everything up to the first comma is
/// dropped. The image format is sniffed from the decoded bytes.
pub fn decode_frame(data: &str) -> Result<RgbImage, FrameError> {
    let payload = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    let bytes = STANDARD.decode(payload)?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
}
