use std::io::Cursor;

use crate::foundation::core::CanvasFrame;
use crate::foundation::error::{CollageError, CollageResult};

/// Lossless single-frame PNG of a composited canvas.
pub fn encode_png(frame: &CanvasFrame, bg_rgba: [u8; 4]) -> CollageResult<Vec<u8>> {
    let rgba = frame.to_opaque_rgba8(bg_rgba)?;
    let img = image::RgbaImage::from_raw(frame.width, frame.height, rgba)
        .ok_or_else(|| CollageError::encode("canvas bytes do not match its dimensions"))?;

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| CollageError::encode(format!("png encode failed: {e}")))?;
    Ok(buf)
}
