use crate::foundation::core::CanvasFrame;
use crate::foundation::error::{CollageError, CollageResult};

/// One composited canvas and how long it stays on screen.
#[derive(Clone, Debug)]
pub struct TimedCanvas {
    pub canvas: CanvasFrame,
    pub duration_ms: u32,
}

/// Assembles canvases into one looping animated image.
///
/// Implementations run synchronously on the calling thread. `progress` receives values in
/// `(0, 1]` after each frame is written.
pub trait AnimatedImageEncoder: Send + Sync {
    fn encode(
        &self,
        frames: &[TimedCanvas],
        progress: &mut dyn FnMut(f32),
    ) -> CollageResult<Vec<u8>>;
}

/// GIF encoder backed by the `gif` crate's NeuQuant quantizer.
#[derive(Clone, Debug)]
pub struct GifEncoder {
    /// Quantizer speed, 1 (best) ..= 30 (fastest).
    pub speed: i32,
    /// Alpha is flattened over this color before quantization.
    pub bg_rgba: [u8; 4],
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self {
            speed: 30,
            bg_rgba: [30, 30, 47, 255],
        }
    }
}

impl AnimatedImageEncoder for GifEncoder {
    #[tracing::instrument(skip_all, fields(frames = frames.len()))]
    fn encode(
        &self,
        frames: &[TimedCanvas],
        progress: &mut dyn FnMut(f32),
    ) -> CollageResult<Vec<u8>> {
        let first = frames
            .first()
            .ok_or_else(|| CollageError::encode("animated image needs at least one frame"))?;
        let (width, height) = (first.canvas.width, first.canvas.height);
        let (w16, h16) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(CollageError::encode(format!(
                    "gif canvas {width}x{height} outside the 1..=65535 range"
                )));
            }
        };

        let mut buf = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut buf, w16, h16, &[])
                .map_err(|e| CollageError::encode(format!("failed to start gif: {e}")))?;
            encoder
                .set_repeat(gif::Repeat::Infinite)
                .map_err(|e| CollageError::encode(format!("failed to set gif repeat: {e}")))?;

            let total = frames.len() as f32;
            for (i, timed) in frames.iter().enumerate() {
                if timed.canvas.width != width || timed.canvas.height != height {
                    return Err(CollageError::encode(format!(
                        "gif frame {i} is {}x{}, expected {width}x{height}",
                        timed.canvas.width, timed.canvas.height
                    )));
                }
                let mut rgba = timed
                    .canvas
                    .to_opaque_rgba8(self.bg_rgba)
                    .map_err(|e| CollageError::encode(e.to_string()))?;
                let mut frame = gif::Frame::from_rgba_speed(w16, h16, &mut rgba, self.speed);
                frame.delay = hundredths(timed.duration_ms);
                encoder
                    .write_frame(&frame)
                    .map_err(|e| CollageError::encode(format!("failed to write gif frame {i}: {e}")))?;
                progress((i + 1) as f32 / total);
            }
        }

        Ok(buf)
    }
}

/// GIF delays are stored in hundredths of a second.
fn hundredths(duration_ms: u32) -> u16 {
    (duration_ms / 10).min(u32::from(u16::MAX)) as u16
}
