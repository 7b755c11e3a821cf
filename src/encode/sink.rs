use crate::foundation::core::CanvasFrame;
use crate::foundation::error::{CollageError, CollageResult};

/// Canvas geometry and rate fixed for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Destination for frames grabbed off the collage canvas during a recording.
///
/// `begin` arms the sink, `push_frame` receives captures with strictly increasing indices
/// and `end` returns the finished container (or nothing for sinks that only keep frames).
pub trait FrameSink: Send {
    fn begin(&mut self, cfg: SinkConfig) -> CollageResult<()>;
    fn push_frame(&mut self, idx: u64, frame: &CanvasFrame) -> CollageResult<()>;
    fn end(&mut self) -> CollageResult<Vec<u8>>;
}

/// Keeps every capture in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    armed: Option<SinkConfig>,
    captured: Vec<(u64, CanvasFrame)>,
    closed: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.armed
    }

    pub fn frames(&self) -> &[(u64, CanvasFrame)] {
        &self.captured
    }

    pub fn is_finished(&self) -> bool {
        self.closed
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> CollageResult<()> {
        *self = Self {
            armed: Some(cfg),
            ..Self::default()
        };
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &CanvasFrame) -> CollageResult<()> {
        if self.armed.is_none() || self.closed {
            return Err(CollageError::encode("memory capture is not recording"));
        }
        match self.captured.last() {
            Some((prev, _)) if idx <= *prev => Err(CollageError::encode(format!(
                "capture index {idx} arrived after {prev}"
            ))),
            _ => {
                self.captured.push((idx, frame.clone()));
                Ok(())
            }
        }
    }

    fn end(&mut self) -> CollageResult<Vec<u8>> {
        self.closed = true;
        Ok(Vec::new())
    }
}
