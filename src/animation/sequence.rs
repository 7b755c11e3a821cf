use crate::foundation::core::Bitmap;

/// GIF frame delay of zero is played at this duration.
pub const DEFAULT_FRAME_MS: u32 = 100;

/// A frame's disposal directive, applied to the persistent canvas before that same frame is
/// drawn (never to the first frame).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposal {
    /// Draw on top of whatever the canvas already holds.
    Keep,
    /// Clear the canvas to transparent, then draw the frame.
    RestoreToBackground,
    /// Treated like `Keep`: prior content stays and the frame draws on top.
    RestorePrevious,
}

impl Disposal {
    /// Whether a frame carrying this disposal starts from a cleared canvas.
    pub fn clears_canvas(self) -> bool {
        matches!(self, Self::RestoreToBackground)
    }
}

impl From<gif::DisposalMethod> for Disposal {
    fn from(value: gif::DisposalMethod) -> Self {
        match value {
            gif::DisposalMethod::Any | gif::DisposalMethod::Keep => Self::Keep,
            gif::DisposalMethod::Background => Self::RestoreToBackground,
            gif::DisposalMethod::Previous => Self::RestorePrevious,
        }
    }
}

/// Convert a GIF delay (hundredths of a second) to milliseconds.
pub fn delay_to_ms(delay_hundredths: u16) -> u32 {
    match delay_hundredths {
        0 => DEFAULT_FRAME_MS,
        d => u32::from(d) * 10,
    }
}

/// One fully composited frame at the sequence's native size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub bitmap: Bitmap,
    pub duration_ms: u32,
}

/// A non-empty, ordered list of composited frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<DecodedFrame>,
}

impl FrameSequence {
    /// Returns `None` for an empty list.
    pub fn new(frames: Vec<DecodedFrame>) -> Option<Self> {
        if frames.is_empty() {
            None
        } else {
            Some(Self { frames })
        }
    }

    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }
}
