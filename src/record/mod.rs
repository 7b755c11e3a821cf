//! Realtime capture of the collage: a tick-driven draw loop feeding a video [`FrameSink`].
//!
//! [`FrameSink`]: crate::encode::sink::FrameSink

pub mod backend;
pub mod clock;
pub mod recorder;
pub mod scheduler;

pub use backend::{CaptureBackend, CaptureSession, FfmpegCapture};
pub use clock::{RecordingClock, TickAction};
pub use recorder::{RecordedVideo, Recorder};
pub use scheduler::{ImmediateScheduler, IntervalScheduler, TickScheduler};
