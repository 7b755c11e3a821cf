use anyhow::Context;

use crate::foundation::core::Bitmap;
use crate::foundation::error::{CollageError, CollageResult};

/// Decode any still image format `image` understands (first frame for animated formats).
pub fn decode_image(bytes: &[u8]) -> CollageResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| CollageError::decode(format!("{e:#}")))?;
    Bitmap::from_rgba_image(dyn_img.to_rgba8())
}
