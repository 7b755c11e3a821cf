use std::sync::Arc;

use resvg::tiny_skia;

use crate::foundation::error::{CollageError, CollageResult};
use crate::foundation::math::{flatten_to_opaque_rgba8, premultiply_rgba8_in_place};

/// Decoded raster in premultiplied RGBA8, row-major, tightly packed.
///
/// Cloning is cheap: pixel storage is shared. Static slots are repeated across a normalized
/// frame domain by cloning the same bitmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Build from straight-alpha RGBA8 bytes.
    pub fn from_straight_rgba8(width: u32, height: u32, mut rgba: Vec<u8>) -> CollageResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| CollageError::decode("bitmap size overflow"))?;
        if width == 0 || height == 0 {
            return Err(CollageError::decode("bitmap must have non-zero dimensions"));
        }
        if rgba.len() != expected {
            return Err(CollageError::decode(format!(
                "bitmap byte length {} does not match {width}x{height}",
                rgba.len()
            )));
        }
        premultiply_rgba8_in_place(&mut rgba);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba),
        })
    }

    pub fn from_rgba_image(img: image::RgbaImage) -> CollageResult<Self> {
        let (width, height) = img.dimensions();
        Self::from_straight_rgba8(width, height, img.into_raw())
    }

    /// Uniform opaque-or-translucent fill.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> CollageResult<Self> {
        let px = (width as usize) * (height as usize);
        let data = rgba.repeat(px);
        Self::from_straight_rgba8(width, height, data)
    }

    /// Take ownership of an already-premultiplied raster.
    pub fn from_pixmap(pixmap: tiny_skia::Pixmap) -> Self {
        let (width, height) = (pixmap.width(), pixmap.height());
        Self {
            width,
            height,
            rgba8_premul: Arc::new(pixmap.take()),
        }
    }

    pub fn as_pixmap(&self) -> Option<tiny_skia::PixmapRef<'_>> {
        tiny_skia::PixmapRef::from_bytes(self.rgba8_premul.as_slice(), self.width, self.height)
    }

    /// Premultiplied pixel at `(x, y)`; `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8_premul[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// A rendered collage canvas snapshot, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct CanvasFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl CanvasFrame {
    pub fn from_pixmap(pixmap: &tiny_skia::Pixmap) -> Self {
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            data: pixmap.data().to_vec(),
        }
    }

    /// Opaque straight RGBA8, alpha flattened over `bg_rgba`.
    pub fn to_opaque_rgba8(&self, bg_rgba: [u8; 4]) -> CollageResult<Vec<u8>> {
        let mut out = vec![0u8; self.data.len()];
        if !flatten_to_opaque_rgba8(&mut out, &self.data, bg_rgba) {
            return Err(CollageError::validation(
                "canvas frame data does not match width*height*4",
            ));
        }
        Ok(out)
    }
}
