use crate::encode::codec::{CodecSupport, VideoCodec, negotiate_codec};
use crate::encode::ffmpeg::{FfmpegCodecSupport, FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::FrameSink;
use crate::foundation::error::CollageResult;
use crate::render::grid::BACKGROUND_RGBA;

/// A negotiated codec with a sink ready to receive frames.
pub struct CaptureSession {
    pub codec: VideoCodec,
    pub sink: Box<dyn FrameSink>,
}

/// Source of capture sinks; fails with `RecordingUnsupported` when nothing in `preference` works.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, preference: &[VideoCodec], bitrate_bps: u64) -> CollageResult<CaptureSession>;
}

/// Capture through the system `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegCapture;

impl CaptureBackend for FfmpegCapture {
    fn open(&self, preference: &[VideoCodec], bitrate_bps: u64) -> CollageResult<CaptureSession> {
        open_with(&FfmpegCodecSupport, preference, |codec| {
            Box::new(FfmpegSink::new(FfmpegSinkOpts {
                codec,
                bitrate_bps,
                bg_rgba: BACKGROUND_RGBA,
            }))
        })
    }
}

/// Negotiate against `support`, then build the sink for the chosen codec.
pub fn open_with(
    support: &dyn CodecSupport,
    preference: &[VideoCodec],
    make_sink: impl FnOnce(VideoCodec) -> Box<dyn FrameSink>,
) -> CollageResult<CaptureSession> {
    let codec = negotiate_codec(preference, support)?;
    tracing::info!(mime = codec.mime_type(), "video capture codec selected");
    Ok(CaptureSession {
        codec,
        sink: make_sink(codec),
    })
}
