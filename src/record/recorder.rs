use std::time::Duration;

use crate::animation::normalize::SlotFrames;
use crate::encode::codec::VideoCodec;
use crate::encode::sink::SinkConfig;
use crate::foundation::config::VideoConfig;
use crate::foundation::core::CanvasFrame;
use crate::foundation::error::{CollageError, CollageResult};
use crate::record::backend::CaptureBackend;
use crate::record::clock::{RecordingClock, TickAction};
use crate::record::scheduler::TickScheduler;
use crate::render::grid::{GridCompositor, RenderTier};

/// Finished video container.
#[derive(Clone, Debug)]
pub struct RecordedVideo {
    pub codec: VideoCodec,
    pub bytes: Vec<u8>,
    pub frames_captured: u64,
}

/// Drives the compositor once per tick against a live canvas and captures the result.
pub struct Recorder<'a> {
    backend: &'a dyn CaptureBackend,
    cfg: &'a VideoConfig,
}

impl<'a> Recorder<'a> {
    pub fn new(backend: &'a dyn CaptureBackend, cfg: &'a VideoConfig) -> Self {
        Self { backend, cfg }
    }

    /// Record `fps * duration_seconds` captured ticks after the warm-up.
    ///
    /// The canvas is redrawn in full on every tick. `progress` receives capture percentages.
    #[tracing::instrument(skip_all, fields(fps = self.cfg.fps, base_frames = self.cfg.base_frames))]
    pub async fn record(
        &self,
        compositor: &mut GridCompositor,
        frames: &SlotFrames,
        scheduler: &mut dyn TickScheduler,
        progress: &mut (dyn FnMut(u32) + Send),
    ) -> CollageResult<RecordedVideo> {
        self.cfg.validate()?;
        let mut session = self.backend.open(&self.cfg.codecs, self.cfg.bitrate_bps)?;

        let tier = RenderTier::Video;
        let size = tier.canvas_size();
        let mut canvas = GridCompositor::new_canvas(tier)?;
        let mut clock = RecordingClock::new(
            self.cfg.warmup_ticks,
            self.cfg.base_frames,
            self.cfg.total_ticks(),
        );
        let mut captured = 0u64;

        loop {
            scheduler.next_tick().await;
            match clock.advance() {
                TickAction::Finish => break,
                TickAction::Draw {
                    content_index,
                    arm,
                    capture,
                } => {
                    if arm {
                        tracing::info!("warm-up complete, capture armed");
                        session.sink.begin(SinkConfig {
                            width: size,
                            height: size,
                            fps: self.cfg.fps,
                        })?;
                    }

                    compositor.render_into(&frames.frame(content_index), tier, &mut canvas)?;

                    if let Some(idx) = capture {
                        session
                            .sink
                            .push_frame(idx, &CanvasFrame::from_pixmap(&canvas))?;
                        captured += 1;
                    }
                    if let Some(p) = clock.progress_percent() {
                        progress(p);
                    }
                }
            }
        }

        scheduler.grace(Duration::from_millis(self.cfg.grace_ms)).await;
        let bytes = session.sink.end()?;
        if captured == 0 {
            return Err(CollageError::encode("recording finished without capturing a frame"));
        }
        tracing::info!(frames = captured, bytes = bytes.len(), "recording finalized");
        Ok(RecordedVideo {
            codec: session.codec,
            bytes,
            frames_captured: captured,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::encode::sink::{FrameSink, InMemorySink};
    use crate::foundation::core::Bitmap;
    use crate::record::backend::CaptureSession;
    use crate::record::scheduler::ImmediateScheduler;
    use crate::render::grid::{GRID_SLOTS, SlotImage};
    use crate::render::tiles::TileRenderer;

    /// Forwards to an [`InMemorySink`] the test can inspect afterwards.
    struct SharedSink(Arc<Mutex<InMemorySink>>);

    impl FrameSink for SharedSink {
        fn begin(&mut self, cfg: SinkConfig) -> CollageResult<()> {
            self.0.lock().unwrap().begin(cfg)
        }
        fn push_frame(&mut self, idx: u64, frame: &CanvasFrame) -> CollageResult<()> {
            self.0.lock().unwrap().push_frame(idx, frame)
        }
        fn end(&mut self) -> CollageResult<Vec<u8>> {
            self.0.lock().unwrap().end()?;
            Ok(b"webm".to_vec())
        }
    }

    struct MemoryBackend(Arc<Mutex<InMemorySink>>);

    impl CaptureBackend for MemoryBackend {
        fn open(&self, preference: &[VideoCodec], _bitrate: u64) -> CollageResult<CaptureSession> {
            Ok(CaptureSession {
                codec: preference[0],
                sink: Box::new(SharedSink(self.0.clone())),
            })
        }
    }

    struct NoCodecs;

    impl CaptureBackend for NoCodecs {
        fn open(&self, _p: &[VideoCodec], _b: u64) -> CollageResult<CaptureSession> {
            Err(CollageError::recording_unsupported("none"))
        }
    }

    fn cycling_frames() -> SlotFrames {
        let shades: Vec<SlotImage> = (0..16u8)
            .map(|i| SlotImage::Image(Bitmap::solid(2, 2, [i * 10, 0, 0, 255]).unwrap()))
            .collect();
        let mut by_slot = std::collections::BTreeMap::new();
        by_slot.insert(1usize, shades);
        SlotFrames::from_normalized(by_slot, 16)
    }

    #[tokio::test]
    async fn records_sixty_frames_after_warmup() {
        let sink = Arc::new(Mutex::new(InMemorySink::new()));
        let backend = MemoryBackend(sink.clone());
        let cfg = VideoConfig::default();
        let mut compositor = GridCompositor::new(
            Some(Bitmap::solid(2, 2, [0, 0, 255, 255]).unwrap()),
            TileRenderer::new(None),
        );
        let mut sched = ImmediateScheduler::default();
        let mut progress = Vec::new();

        let video = Recorder::new(&backend, &cfg)
            .record(&mut compositor, &cycling_frames(), &mut sched, &mut |p| {
                progress.push(p)
            })
            .await
            .unwrap();

        assert_eq!(video.frames_captured, 60);
        assert_eq!(video.bytes, b"webm");
        assert_eq!(video.codec, VideoCodec::Vp9Webm);
        assert_eq!(progress, vec![25, 50, 75, 100]);
        assert_eq!(sched.ticks, 16 + 60 + 1);
        assert_eq!(sched.graces, vec![Duration::from_millis(200)]);

        let sink = sink.lock().unwrap();
        assert_eq!(sink.config().unwrap().width, 600);
        let frames = sink.frames();
        assert_eq!(frames.len(), 60);
        // Capture index 17 shows content frame 17 % 16 = 1 in slot 1 (x 200..400, y 0..200).
        let (idx, frame) = &frames[17];
        assert_eq!(*idx, 17);
        let i = ((100 * frame.width + 300) * 4) as usize;
        assert_eq!(&frame.data[i..i + 4], &[10, 0, 0, 255]);
    }

    #[tokio::test]
    async fn unsupported_backend_surfaces_before_drawing() {
        let cfg = VideoConfig::default();
        let mut compositor = GridCompositor::new(None, TileRenderer::new(None));
        let mut sched = ImmediateScheduler::default();
        let still = SlotFrames::still(std::array::from_fn::<_, GRID_SLOTS, _>(|_| SlotImage::Logo));
        let err = Recorder::new(&NoCodecs, &cfg)
            .record(&mut compositor, &still, &mut sched, &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, CollageError::RecordingUnsupported(_)));
        assert_eq!(sched.ticks, 0);
    }
}
