use std::collections::BTreeMap;

use crate::animation::sequence::FrameSequence;
use crate::render::grid::{GRID_SLOTS, SlotImage};

/// One slot's input to normalization.
#[derive(Clone, Debug)]
pub enum SlotSource {
    /// Already resolved still content (image, logo, or placeholder); repeated on every frame.
    Still(SlotImage),
    Animated(FrameSequence),
}

/// Source frame shown at normalized index `f` of `target`: nearest-earlier, wrapping.
///
/// Integer form of `floor(f / target * len) mod len`.
pub fn resample_index(f: usize, target: usize, len: usize) -> usize {
    if target == 0 || len == 0 {
        return 0;
    }
    (f * len / target) % len
}

/// Resample a sequence onto exactly `target` entries.
pub fn resample<T: Clone>(frames: &[T], target: usize) -> Vec<T> {
    if frames.is_empty() {
        return Vec::new();
    }
    (0..target)
        .map(|f| frames[resample_index(f, target, frames.len())].clone())
        .collect()
}

/// Align every slot onto a shared domain of `target` frames.
///
/// All pixel data is already resolved here, so playback from the result does no further
/// fetch or decode work.
pub fn normalize<K: Ord + Clone>(
    sources: &BTreeMap<K, SlotSource>,
    target: usize,
) -> BTreeMap<K, Vec<SlotImage>> {
    sources
        .iter()
        .map(|(key, source)| {
            let frames = match source {
                SlotSource::Still(image) => vec![image.clone(); target],
                SlotSource::Animated(seq) => {
                    let bitmaps: Vec<SlotImage> = seq
                        .frames()
                        .iter()
                        .map(|f| SlotImage::Image(f.bitmap.clone()))
                        .collect();
                    resample(&bitmaps, target)
                }
            };
            (key.clone(), frames)
        })
        .collect()
}

/// Per-slot aligned frames for all nine grid slots: what the compositor draws at each index.
#[derive(Clone, Debug)]
pub struct SlotFrames {
    slots: [Vec<SlotImage>; GRID_SLOTS],
    len: usize,
}

impl SlotFrames {
    /// Build from `normalize` output keyed by slot. Slots absent from the map show the logo.
    pub fn from_normalized(mut by_slot: BTreeMap<usize, Vec<SlotImage>>, len: usize) -> Self {
        let slots = std::array::from_fn(|slot| {
            by_slot
                .remove(&slot)
                .filter(|frames| frames.len() == len)
                .unwrap_or_else(|| vec![SlotImage::Logo; len])
        });
        Self {
            slots,
            len: len.max(1),
        }
    }

    /// A single still frame.
    pub fn still(images: [SlotImage; GRID_SLOTS]) -> Self {
        Self {
            slots: images.map(|image| vec![image]),
            len: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot images at frame `index`, wrapping past the end.
    pub fn frame(&self, index: usize) -> [SlotImage; GRID_SLOTS] {
        std::array::from_fn(|slot| {
            let frames = &self.slots[slot];
            frames
                .get(index % self.len)
                .or_else(|| frames.first())
                .cloned()
                .unwrap_or(SlotImage::Logo)
        })
    }
}
