use std::sync::Arc;
use std::time::Duration;

use crate::animation::sequence::{DecodedFrame, Disposal, FrameSequence, delay_to_ms};
use crate::assets::fetch::SourceFetcher;
use crate::foundation::core::Bitmap;
use crate::foundation::error::{CollageError, CollageResult};

/// Pulls raw bytes for an animated source and turns them into a composited [`FrameSequence`].
#[derive(Clone)]
pub struct FrameExtractor {
    fetcher: Arc<dyn SourceFetcher>,
    timeout: Duration,
}

impl FrameExtractor {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// `None` on fetch failure, parse failure, zero frames, or when fetch plus decode overrun
    /// the budget. Never an error.
    #[tracing::instrument(skip(self))]
    pub async fn extract(&self, source_url: &str) -> Option<FrameSequence> {
        match tokio::time::timeout(self.timeout, self.load(source_url)).await {
            Ok(Ok(seq)) => {
                tracing::debug!(frames = seq.len(), "extracted frame sequence");
                Some(seq)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "frame extraction failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "frame extraction timed out");
                None
            }
        }
    }

    async fn load(&self, source_url: &str) -> CollageResult<FrameSequence> {
        let bytes = self.fetcher.fetch(source_url).await?;

        #[cfg(feature = "media-ffmpeg")]
        if crate::animation::video::is_video_container(&bytes) {
            return crate::animation::video::decode_video(bytes).await;
        }

        // Decoding is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode_animation(&bytes))
            .await
            .map_err(|e| CollageError::decode(format!("decode task failed: {e}")))?
    }
}

/// Sniff the container and decode every frame. GIF only; video sources go through
/// [`FrameExtractor`].
pub fn decode_animation(bytes: &[u8]) -> CollageResult<FrameSequence> {
    if is_gif(bytes) {
        return decode_gif(bytes);
    }
    Err(CollageError::decode("unsupported animation container"))
}

fn is_gif(bytes: &[u8]) -> bool {
    bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")
}

/// Decode a GIF, compositing each frame onto a persistent logical-screen canvas.
pub fn decode_gif(bytes: &[u8]) -> CollageResult<FrameSequence> {
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = opts
        .read_info(bytes)
        .map_err(|e| CollageError::decode(format!("gif header: {e}")))?;

    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());
    if width == 0 || height == 0 {
        return Err(CollageError::decode("gif has a zero-sized logical screen"));
    }

    let mut screen = vec![0u8; (width as usize) * (height as usize) * 4];
    let mut frames = Vec::new();

    while let Some(frame) = decoder
        .read_next_frame()
        .map_err(|e| CollageError::decode(format!("gif frame {}: {e}", frames.len())))?
    {
        let disposal = Disposal::from(frame.dispose);
        if !frames.is_empty() && disposal.clears_canvas() {
            screen.fill(0);
        }
        blit_over(
            &mut screen,
            width,
            height,
            FrameRect {
                left: u32::from(frame.left),
                top: u32::from(frame.top),
                width: u32::from(frame.width),
                height: u32::from(frame.height),
            },
            &frame.buffer,
        );
        frames.push(DecodedFrame {
            bitmap: Bitmap::from_straight_rgba8(width, height, screen.clone())?,
            duration_ms: delay_to_ms(frame.delay),
        });
    }

    FrameSequence::new(frames).ok_or_else(|| CollageError::decode("gif contains no frames"))
}

#[derive(Clone, Copy, Debug)]
struct FrameRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// Copy a straight-alpha RGBA sub-image onto the screen, clipped to the screen bounds.
/// Fully transparent source pixels leave the screen untouched.
fn blit_over(screen: &mut [u8], screen_w: u32, screen_h: u32, rect: FrameRect, src: &[u8]) {
    let rows = rect.height.min(screen_h.saturating_sub(rect.top));
    let cols = rect.width.min(screen_w.saturating_sub(rect.left));
    for y in 0..rows {
        for x in 0..cols {
            let si = ((y * rect.width + x) as usize) * 4;
            let Some(px) = src.get(si..si + 4) else {
                return;
            };
            if px[3] == 0 {
                continue;
            }
            let di = (((rect.top + y) * screen_w + rect.left + x) as usize) * 4;
            screen[di..di + 4].copy_from_slice(px);
        }
    }
}
