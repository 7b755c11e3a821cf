use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodes_collage::animation::{
    DecodedFrame, FrameExtractor, FrameSequence, SlotFrames, SlotSource, decode_animation,
    normalize, resample_index,
};
use nodes_collage::render::GRID_SLOTS;
use nodes_collage::{Bitmap, CollageError, CollageResult, SlotImage, SourceFetcher};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];

/// Full red frame, then a 2x2 green patch at the origin kept over it.
fn patched_gif() -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut enc = gif::Encoder::new(&mut buf, 4, 4, &[]).unwrap();
        let mut full = RED.repeat(16);
        let mut first = gif::Frame::from_rgba_speed(4, 4, &mut full, 30);
        first.delay = 0;
        first.dispose = gif::DisposalMethod::Keep;
        enc.write_frame(&first).unwrap();

        let mut patch = GREEN.repeat(4);
        let mut second = gif::Frame::from_rgba_speed(2, 2, &mut patch, 30);
        second.delay = 7;
        enc.write_frame(&second).unwrap();
    }
    buf
}

struct OneFile(Vec<u8>);

#[async_trait]
impl SourceFetcher for OneFile {
    async fn fetch(&self, source: &str) -> CollageResult<Vec<u8>> {
        if source == "https://x/a.gif" {
            Ok(self.0.clone())
        } else {
            Err(CollageError::source_fetch("not found"))
        }
    }
}

fn shade(v: u8) -> Bitmap {
    Bitmap::solid(1, 1, [v, v, v, 255]).unwrap()
}

fn sequence(len: u8) -> FrameSequence {
    FrameSequence::new(
        (0..len)
            .map(|i| DecodedFrame {
                bitmap: shade(i),
                duration_ms: 100,
            })
            .collect(),
    )
    .unwrap()
}

fn shade_of(image: &SlotImage) -> Option<u8> {
    match image {
        SlotImage::Image(b) => b.pixel(0, 0).map(|p| p[0]),
        _ => None,
    }
}

#[test]
fn gif_frames_are_composited_with_delays() {
    let seq = decode_animation(&patched_gif()).unwrap();
    assert_eq!(seq.len(), 2);

    let [first, second] = seq.frames() else {
        panic!("expected two frames");
    };
    assert_eq!(first.duration_ms, 100);
    assert_eq!(second.duration_ms, 70);
    assert_eq!((second.bitmap.width, second.bitmap.height), (4, 4));
    assert_eq!(second.bitmap.pixel(0, 0), Some(GREEN));
    assert_eq!(second.bitmap.pixel(3, 3), Some(RED));
    assert_eq!(first.bitmap.pixel(0, 0), Some(RED));
    assert_eq!(seq.total_duration_ms(), 170);
}

#[test]
fn non_animated_payloads_are_rejected() {
    assert!(decode_animation(b"\x89PNG\r\n\x1a\n").is_err());
    assert!(decode_animation(&[]).is_err());
}

#[tokio::test]
async fn extractor_maps_every_failure_to_none() {
    let extractor = FrameExtractor::new(Arc::new(OneFile(patched_gif())), Duration::from_secs(5));
    assert_eq!(extractor.extract("https://x/a.gif").await.map(|s| s.len()), Some(2));
    assert!(extractor.extract("https://x/missing.gif").await.is_none());

    let garbage = FrameExtractor::new(
        Arc::new(OneFile(b"GIF89a garbage".to_vec())),
        Duration::from_secs(5),
    );
    assert!(garbage.extract("https://x/a.gif").await.is_none());
}

/// Serves the patched GIF after `delay`, or never when `delay` is `None`.
struct Slow(Option<Duration>);

#[async_trait]
impl SourceFetcher for Slow {
    async fn fetch(&self, _source: &str) -> CollageResult<Vec<u8>> {
        match self.0 {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(patched_gif())
            }
            None => std::future::pending().await,
        }
    }
}

#[tokio::test]
async fn extraction_budget_spans_fetch_and_decode() {
    let budget = Duration::from_millis(400);
    let quick = FrameExtractor::new(Arc::new(Slow(Some(Duration::from_millis(20)))), budget);
    let stalled = FrameExtractor::new(Arc::new(Slow(None)), budget);

    let started = std::time::Instant::now();
    let (ok, hung) = tokio::join!(
        quick.extract("https://x/a.gif"),
        stalled.extract("https://x/a.gif")
    );
    assert_eq!(ok.map(|s| s.len()), Some(2));
    assert!(hung.is_none());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn normalization_aligns_mixed_lengths() {
    let mut sources = BTreeMap::new();
    sources.insert(1usize, SlotSource::Animated(sequence(3)));
    sources.insert(2usize, SlotSource::Animated(sequence(5)));
    sources.insert(
        3usize,
        SlotSource::Still(SlotImage::Unavailable {
            name: "NODES #9".into(),
        }),
    );

    let out = normalize(&sources, 5);
    let shades = |slot: usize| -> Vec<Option<u8>> { out[&slot].iter().map(shade_of).collect() };
    assert_eq!(shades(1), vec![Some(0), Some(0), Some(1), Some(1), Some(2)]);
    assert_eq!(shades(2), vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
    assert!(out[&3].iter().all(|s| matches!(s, SlotImage::Unavailable { .. })));

    let frames = SlotFrames::from_normalized(out, 5);
    assert_eq!(frames.len(), 5);
    // Indices wrap; unlisted slots show the logo.
    let wrapped = frames.frame(7);
    assert_eq!(shade_of(&wrapped[2]), Some(2));
    assert_eq!(wrapped.len(), GRID_SLOTS);
    assert_eq!(wrapped[0], SlotImage::Logo);
    assert_eq!(wrapped[8], SlotImage::Logo);
}

#[test]
fn longer_sources_are_decimated() {
    let picks: Vec<usize> = (0..4).map(|f| resample_index(f, 4, 10)).collect();
    assert_eq!(picks, vec![0, 2, 5, 7]);
}
