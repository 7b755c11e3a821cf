use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes_collage::encode::gif::{AnimatedImageEncoder, TimedCanvas};
use nodes_collage::encode::sink::{FrameSink, InMemorySink, SinkConfig};
use nodes_collage::nft::selection::MSG_INVALID_WALLET;
use nodes_collage::pipeline::status;
use nodes_collage::record::{CaptureBackend, CaptureSession, ImmediateScheduler, TickScheduler};
use nodes_collage::{
    ArtifactKind, CanvasFrame, CollageConfig, CollageError, CollagePipeline, CollageResult,
    ExportFormat, NftRecord, OwnershipSource, PipelineState, SourceFetcher, VideoCodec,
};

const WALLET: &str = "0x00000000000000000000000000000000000000aa";
const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn gif(colors: &[[u8; 4]], delay: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut enc = gif::Encoder::new(&mut buf, 4, 4, &[]).unwrap();
        enc.set_repeat(gif::Repeat::Infinite).unwrap();
        for c in colors {
            let mut px = c.repeat(16);
            let mut frame = gif::Frame::from_rgba_speed(4, 4, &mut px, 30);
            frame.delay = delay;
            enc.write_frame(&frame).unwrap();
        }
    }
    buf
}

/// Serves canned bytes and counts requests.
#[derive(Default)]
struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, source: &str) -> CollageResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(source)
            .cloned()
            .ok_or_else(|| CollageError::source_fetch(format!("404 {source}")))
    }
}

struct FakeOwnership {
    nfts: Vec<NftRecord>,
    calls: AtomicUsize,
}

impl FakeOwnership {
    fn new(nfts: Vec<NftRecord>) -> Self {
        Self {
            nfts,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OwnershipSource for FakeOwnership {
    async fn owned_nfts(&self, _wallet: &str) -> CollageResult<Vec<NftRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nfts.clone())
    }
}

struct FailingGif;

impl AnimatedImageEncoder for FailingGif {
    fn encode(&self, _f: &[TimedCanvas], _p: &mut dyn FnMut(f32)) -> CollageResult<Vec<u8>> {
        Err(CollageError::encode("quantizer exploded"))
    }
}

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
        Ok(b"\x1aE\xdf\xa3webm".to_vec())
    }
}

struct MemoryCapture(Arc<Mutex<InMemorySink>>);

impl CaptureBackend for MemoryCapture {
    fn open(&self, preference: &[VideoCodec], _bitrate: u64) -> CollageResult<CaptureSession> {
        Ok(CaptureSession {
            codec: preference[0],
            sink: Box::new(SharedSink(self.0.clone())),
        })
    }
}

struct NoCapture;

impl CaptureBackend for NoCapture {
    fn open(&self, _p: &[VideoCodec], _b: u64) -> CollageResult<CaptureSession> {
        Err(CollageError::recording_unsupported("no webm encoder"))
    }
}

fn logo_file(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "nodes-collage-logo-{}-{tag}.png",
        std::process::id()
    ));
    std::fs::write(&path, png(BLUE)).unwrap();
    path
}

fn still(id: &str, url: &str) -> NftRecord {
    NftRecord::new(id, format!("NODES #{id}"), Some(url.to_string()), None)
}

fn pipeline(
    tag: &str,
    fetcher: Arc<FakeFetcher>,
    nfts: Vec<NftRecord>,
) -> (CollagePipeline, Arc<FakeOwnership>) {
    let ownership = Arc::new(FakeOwnership::new(nfts));
    let cfg = CollageConfig {
        logo_path: logo_file(tag),
        ..CollageConfig::default()
    };
    let p = CollagePipeline::new(cfg, fetcher, ownership.clone())
        .unwrap()
        .with_scheduler_factory(Box::new(|_fps| {
            Box::new(ImmediateScheduler::default()) as Box<dyn TickScheduler>
        }));
    (p, ownership)
}

fn rgba_at(img: &image::RgbaImage, x: u32, y: u32) -> [u8; 4] {
    img.get_pixel(x, y).0
}

#[tokio::test]
async fn empty_wallet_reports_and_fetches_nothing() {
    let fetcher = Arc::new(FakeFetcher::default());
    let (mut p, ownership) = pipeline("empty", fetcher.clone(), Vec::new());

    assert_eq!(p.load_wallet(WALLET).await.unwrap(), 0);
    assert_eq!(p.status().current(), Some("No NODES NFTs found in this wallet"));
    assert_eq!(ownership.calls.load(Ordering::SeqCst), 1);

    let err = p.export(ExportFormat::Png).await.unwrap_err();
    assert!(matches!(err, CollageError::UserInput(_)));
    assert_eq!(p.status().current(), Some("Please select at least 2 NFTs"));
    assert!(matches!(p.state(), PipelineState::Failed(_)));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

/// Accepts the lookup and never answers.
struct StalledOwnership;

#[async_trait]
impl OwnershipSource for StalledOwnership {
    async fn owned_nfts(&self, _wallet: &str) -> CollageResult<Vec<NftRecord>> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_ownership_lookup_times_out() {
    let mut p = CollagePipeline::new(
        CollageConfig::default(),
        Arc::new(FakeFetcher::default()),
        Arc::new(StalledOwnership),
    )
    .unwrap();

    let err = p.load_wallet(WALLET).await.unwrap_err();
    assert!(matches!(err, CollageError::SourceFetch(_)));
    assert!(err.to_string().contains("timed out"), "{err}");
    assert_eq!(p.status().current(), Some(status::MSG_FETCH_ERROR));
    assert!(p.session().nfts().is_empty());
}

#[test]
fn pipeline_refuses_an_invalid_config() {
    let cfg = CollageConfig {
        gif_max_frames: 0,
        ..CollageConfig::default()
    };
    let res = CollagePipeline::new(
        cfg,
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeOwnership::new(Vec::new())),
    );
    assert!(matches!(res, Err(CollageError::Validation(_))));
}

#[tokio::test]
async fn malformed_wallet_never_reaches_the_api() {
    let (mut p, ownership) = pipeline("badwallet", Arc::new(FakeFetcher::default()), Vec::new());
    assert!(p.load_wallet("0x1234").await.is_err());
    assert_eq!(p.status().current(), Some(MSG_INVALID_WALLET));
    assert_eq!(ownership.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn selection_limit_is_reported() {
    let nfts: Vec<NftRecord> = (0..10)
        .map(|i| still(&i.to_string(), "https://x/none.png"))
        .collect();
    let (mut p, _) = pipeline("limit", Arc::new(FakeFetcher::default()), nfts);
    p.load_wallet(WALLET).await.unwrap();
    for i in 0..8 {
        assert!(p.toggle(i).unwrap());
    }
    assert!(p.toggle(8).is_err());
    assert_eq!(p.status().current(), Some("You can select maximum 8 NFTs"));
    assert_eq!(p.session().selection().len(), 8);
}

#[tokio::test]
async fn hd_png_places_tiles_in_selection_order() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/red.png", png(RED))
            .with("https://x/green.png", png(GREEN)),
    );
    let nfts = vec![still("1", "https://x/red.png"), still("2", "https://x/green.png")];
    let (mut p, _) = pipeline("hd", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(1).unwrap();
    p.toggle(0).unwrap();

    let artifact = p.export(ExportFormat::Png).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::HdPng);
    assert_eq!(artifact.mime_type, "image/png");
    assert!(artifact.file_name.starts_with("nodes-collage-hd-"));
    assert!(artifact.file_name.ends_with(".png"));
    assert!(!artifact.degraded);
    assert_eq!(
        p.transitions(),
        &[PipelineState::Idle, PipelineState::StaticPath, PipelineState::Done]
    );

    let img = image::load_from_memory(&artifact.bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (2400, 2400));
    // Slot 0 logo, slots 1-2 in pick order, slots 3-8 repeat the logo.
    let expected = [BLUE, GREEN, RED, BLUE, BLUE, BLUE, BLUE, BLUE, BLUE];
    for (slot, want) in expected.iter().enumerate() {
        let (row, col) = (slot as u32 / 3, slot as u32 % 3);
        let centre = rgba_at(&img, 400 + col * 800, 400 + row * 800);
        assert_eq!(&centre, want, "slot {slot}");
    }

    let last = p.session().last_output().unwrap();
    assert_eq!(last.kind, ArtifactKind::HdPng);
    assert_eq!(last.byte_len, artifact.bytes.len());
}

#[tokio::test]
async fn static_gif_encode_failure_degrades_to_png() {
    let fetcher = Arc::new(FakeFetcher::default().with("https://x/red.png", png(RED)));
    let nfts = vec![still("1", "https://x/red.png"), still("2", "https://x/red.png")];
    let (p, _) = pipeline("gif-fail", fetcher, nfts);
    let mut p = p.with_gif_encoder(Box::new(FailingGif));
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Gif).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::HdPng);
    assert!(artifact.degraded);
    assert!(p.status().contains(status::MSG_STATIC_GIF_FALLBACK));
    assert_eq!(p.state(), &PipelineState::Done);
}

#[tokio::test]
async fn static_gif_is_one_second_single_frame() {
    let fetcher = Arc::new(FakeFetcher::default().with("https://x/red.png", png(RED)));
    let nfts = vec![still("1", "https://x/red.png"), still("2", "https://x/missing.png")];
    let (mut p, _) = pipeline("gif-static", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Gif).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::StaticGif);
    assert_eq!((artifact.width, artifact.height), (600, 600));

    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = opts.read_info(Cursor::new(artifact.bytes)).unwrap();
    let mut delays = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        delays.push(frame.delay);
    }
    assert_eq!(delays, vec![100]);
}

#[tokio::test]
async fn animated_gif_follows_longest_sequence() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/anim.gif", gif(&[RED, GREEN, BLUE], 5))
            .with("https://x/red.png", png(RED)),
    );
    let nfts = vec![
        still("1", "https://x/anim.gif"),
        still("2", "https://x/red.png"),
    ];
    assert!(nfts[0].is_animated);
    let (mut p, _) = pipeline("gif-anim", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Gif).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::AnimatedGif);
    assert_eq!(artifact.frame_count, 3);
    assert!(artifact.file_name.starts_with("nodes-animated-collage-"));
    assert!(!artifact.degraded);
    assert_eq!(
        p.transitions(),
        &[
            PipelineState::Idle,
            PipelineState::AnimatedImagePath,
            PipelineState::Done
        ]
    );
    assert!(p.status().contains("Rendering GIF: 100%"));

    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = opts.read_info(Cursor::new(artifact.bytes)).unwrap();
    let mut delays = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        delays.push(frame.delay);
    }
    assert_eq!(delays, vec![5, 5, 5]);
}

#[tokio::test]
async fn animated_gif_without_frames_degrades() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/broken.gif", b"GIF89a-nope".to_vec())
            .with("https://x/red.png", png(RED)),
    );
    let nfts = vec![
        still("1", "https://x/broken.gif"),
        still("2", "https://x/red.png"),
    ];
    let (mut p, _) = pipeline("gif-broken", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Gif).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::HdPng);
    assert!(artifact.degraded);
    assert!(p.status().contains(status::MSG_NO_FRAMES_FALLBACK));
}

#[tokio::test]
async fn video_records_sixty_frames() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/anim.gif", gif(&[RED, GREEN], 10))
            .with("https://x/red.png", png(RED)),
    );
    let nfts = vec![
        still("1", "https://x/anim.gif"),
        still("2", "https://x/red.png"),
    ];
    let sink = Arc::new(Mutex::new(InMemorySink::new()));
    let (p, _) = pipeline("video", fetcher, nfts);
    let mut p = p.with_capture_backend(Box::new(MemoryCapture(sink.clone())));
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Video).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Video);
    assert_eq!(artifact.mime_type, "video/webm;codecs=vp9");
    assert!(artifact.file_name.ends_with(".webm"));
    assert_eq!(artifact.frame_count, 60);
    assert!(p.status().contains("Recording: 100%"));
    assert_eq!(p.state(), &PipelineState::Done);

    let sink = sink.lock().unwrap();
    assert!(sink.is_finished());
    // The two-frame source spans 16 normalized frames: content 0..8 red, 8..16 green.
    let px = |i: usize| {
        let (_, frame) = &sink.frames()[i];
        let o = ((100 * frame.width + 300) * 4) as usize;
        [frame.data[o], frame.data[o + 1], frame.data[o + 2], frame.data[o + 3]]
    };
    assert_eq!(px(0), RED);
    assert_eq!(px(7), RED);
    assert_eq!(px(8), GREEN);
    assert_eq!(px(16), RED);
}

#[tokio::test]
async fn video_without_capture_support_degrades() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/anim.gif", gif(&[RED, GREEN], 10))
            .with("https://x/red.png", png(RED)),
    );
    let nfts = vec![
        still("1", "https://x/anim.gif"),
        still("2", "https://x/red.png"),
    ];
    let (p, _) = pipeline("video-none", fetcher, nfts);
    let mut p = p.with_capture_backend(Box::new(NoCapture));
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Video).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::HdPng);
    assert!(artifact.degraded);
    assert!(p.status().contains(status::MSG_VIDEO_FALLBACK));
}

#[tokio::test]
async fn video_of_still_selection_is_png() {
    let fetcher = Arc::new(FakeFetcher::default().with("https://x/red.png", png(RED)));
    let nfts = vec![still("1", "https://x/red.png"), still("2", "https://x/red.png")];
    let (mut p, _) = pipeline("video-still", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    let artifact = p.export(ExportFormat::Video).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::HdPng);
    assert!(!artifact.degraded);
    assert!(p.status().contains(status::MSG_VIDEO_NOT_ANIMATED));
}

#[tokio::test]
async fn preview_must_be_generated_before_download() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://x/red.png", png(RED))
            .with("https://x/green.png", png(GREEN)),
    );
    let nfts = vec![still("1", "https://x/red.png"), still("2", "https://x/green.png")];
    let (mut p, _) = pipeline("preview", fetcher, nfts);
    p.load_wallet(WALLET).await.unwrap();
    p.toggle(0).unwrap();
    p.toggle(1).unwrap();

    assert!(p.download_preview().is_err());
    assert_eq!(p.status().current(), Some(status::MSG_DOWNLOAD_ERROR));

    let generated = p.generate().await.unwrap();
    assert_eq!(generated.kind, ArtifactKind::PreviewPng);
    assert_eq!(p.status().current(), Some(status::MSG_GENERATE_SUCCESS));
    let img = image::load_from_memory(&generated.bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (600, 600));
    assert_eq!(rgba_at(&img, 300, 100), RED);
    assert_eq!(rgba_at(&img, 500, 100), GREEN);

    assert_eq!(p.download_preview().unwrap().bytes, generated.bytes);

    // Reordering invalidates the on-screen collage.
    p.swap(0, 1).unwrap();
    assert!(p.download_preview().is_err());
}
