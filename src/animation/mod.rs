//! Per-tile animation: decoding animated sources into frame sequences and normalizing them
//! onto a shared frame count.

pub mod extract;
pub mod normalize;
pub mod sequence;
#[cfg(feature = "media-ffmpeg")]
pub mod video;

pub use extract::{FrameExtractor, decode_animation};
pub use normalize::{SlotFrames, SlotSource, normalize, resample, resample_index};
pub use sequence::{DecodedFrame, Disposal, FrameSequence};
