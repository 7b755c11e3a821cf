use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::animation::extract::FrameExtractor;
use crate::animation::normalize::{SlotFrames, SlotSource, normalize, resample_index};
use crate::animation::sequence::FrameSequence;
use crate::assets::fetch::SourceFetcher;
use crate::assets::{Resolved, load_logo, resolve_bitmap};
use crate::encode::gif::{AnimatedImageEncoder, GifEncoder, TimedCanvas};
use crate::encode::png::encode_png;
use crate::foundation::config::CollageConfig;
use crate::foundation::error::{CollageError, CollageResult};
use crate::nft::api::OwnershipSource;
use crate::nft::record::NftRecord;
use crate::nft::selection::validate_wallet;
use crate::pipeline::artifact::{ArtifactKind, ExportArtifact, FileNamer};
use crate::pipeline::session::{OutputSummary, Session};
use crate::pipeline::status::{self, StatusBoard};
use crate::record::backend::{CaptureBackend, FfmpegCapture};
use crate::record::recorder::Recorder;
use crate::record::scheduler::{IntervalScheduler, TickScheduler};
use crate::render::grid::{
    BACKGROUND_RGBA, GRID_SLOTS, GridCompositor, RenderTier, SlotContent, SlotImage,
    slot_assignments,
};
use crate::render::tiles::TileRenderer;

const STATIC_GIF_FRAME_MS: u32 = 1000;

/// Requested output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// 2400x2400 still PNG.
    Png,
    /// Single-frame GIF, or an animated GIF when the selection animates.
    Gif,
    /// Two-second looping WebM.
    Video,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    StaticPath,
    AnimatedImagePath,
    VideoPath,
    Done,
    Failed(String),
}

/// Builds a pacing scheduler for a given frame rate.
pub type SchedulerFactory = Box<dyn Fn(u32) -> Box<dyn TickScheduler> + Send + Sync>;

/// Owns the session and runs exports one at a time.
pub struct CollagePipeline {
    config: CollageConfig,
    session: Session,
    status: StatusBoard,
    state: PipelineState,
    transitions: Vec<PipelineState>,
    fetcher: Arc<dyn SourceFetcher>,
    ownership: Arc<dyn OwnershipSource>,
    gif_encoder: Box<dyn AnimatedImageEncoder>,
    capture: Box<dyn CaptureBackend>,
    schedulers: SchedulerFactory,
    tiles: TileRenderer,
    namer: FileNamer,
    /// On-screen collage for the current selection; dropped whenever the selection changes.
    preview: Option<ExportArtifact>,
}

impl CollagePipeline {
    /// Fails when `config` does not validate.
    pub fn new(
        config: CollageConfig,
        fetcher: Arc<dyn SourceFetcher>,
        ownership: Arc<dyn OwnershipSource>,
    ) -> CollageResult<Self> {
        config.validate()?;
        let session = Session::new(config.min_selection, config.max_selection);
        Ok(Self {
            config,
            session,
            status: StatusBoard::new(),
            state: PipelineState::Idle,
            transitions: Vec::new(),
            fetcher,
            ownership,
            gif_encoder: Box::new(GifEncoder::default()),
            capture: Box::new(FfmpegCapture),
            schedulers: Box::new(|fps| Box::new(IntervalScheduler::new(fps))),
            tiles: TileRenderer::new(None),
            namer: FileNamer::default(),
            preview: None,
        })
    }

    pub fn with_gif_encoder(mut self, encoder: Box<dyn AnimatedImageEncoder>) -> Self {
        self.gif_encoder = encoder;
        self
    }

    pub fn with_capture_backend(mut self, backend: Box<dyn CaptureBackend>) -> Self {
        self.capture = backend;
        self
    }

    pub fn with_scheduler_factory(mut self, factory: SchedulerFactory) -> Self {
        self.schedulers = factory;
        self
    }

    pub fn with_tiles(mut self, tiles: TileRenderer) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn config(&self) -> &CollageConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// States visited by the most recent export, starting at `Idle`.
    pub fn transitions(&self) -> &[PipelineState] {
        &self.transitions
    }

    /// Validate the wallet and load its tokens. Returns how many were found.
    #[tracing::instrument(skip(self))]
    pub async fn load_wallet(&mut self, wallet: &str) -> CollageResult<usize> {
        let wallet = match validate_wallet(wallet) {
            Ok(w) => w.to_string(),
            Err(e) => {
                self.status.set(user_message(&e));
                return Err(e);
            }
        };

        let budget = self.config.timeouts.ownership();
        let lookup = tokio::time::timeout(budget, self.ownership.owned_nfts(&wallet))
            .await
            .unwrap_or_else(|_| {
                Err(CollageError::source_fetch(format!(
                    "ownership lookup timed out after {budget:?}"
                )))
            });
        let nfts = match lookup {
            Ok(nfts) => nfts,
            Err(e) => {
                tracing::warn!(error = %e, "ownership lookup failed");
                self.status.set(status::MSG_FETCH_ERROR);
                return Err(e);
            }
        };

        let count = nfts.len();
        if count == 0 {
            self.status.set(status::no_nfts(&self.config.collection_name));
        } else {
            self.status.set(format!("{count} NFTs found"));
        }
        self.session.load(&wallet, nfts);
        self.preview = None;
        Ok(count)
    }

    /// Toggle one NFT in or out of the selection, reporting limit errors on the status line.
    pub fn toggle(&mut self, idx: usize) -> CollageResult<bool> {
        let res = self.session.toggle(idx);
        match &res {
            Ok(_) => {
                self.preview = None;
                self.status
                    .set(format!("{} NFTs selected", self.session.selection().len()));
            }
            Err(e) => self.status.set(user_message(e)),
        }
        res
    }

    /// Swap two selection positions (drag-and-drop reorder).
    pub fn swap(&mut self, a: usize, b: usize) -> CollageResult<()> {
        let res = self.session.swap(a, b);
        match &res {
            Ok(()) => self.preview = None,
            Err(e) => self.status.set(user_message(e)),
        }
        res
    }

    /// Render the 600x600 collage shown on screen. Stills only; animated tokens show their
    /// first image.
    #[tracing::instrument(skip(self))]
    pub async fn generate(&mut self) -> CollageResult<ExportArtifact> {
        let selected = match self.session.selected_records() {
            Ok(v) => v,
            Err(e) => {
                self.status.set(user_message(&e));
                return Err(e);
            }
        };
        self.status.set("Generating collage...");

        let slots = self
            .resolve_still_slots(&selected, self.config.timeouts.preview_image())
            .await;
        let mut compositor = self.compositor().await;
        let frame = match compositor.render_frame(&slots, RenderTier::Preview) {
            Ok(frame) => frame,
            Err(e) => {
                self.status.set(user_message(&e));
                return Err(e);
            }
        };
        let bytes = match encode_png(&frame, BACKGROUND_RGBA) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.status.set(user_message(&e));
                return Err(e);
            }
        };

        let artifact = ExportArtifact {
            kind: ArtifactKind::PreviewPng,
            file_name: self.namer.name(ArtifactKind::PreviewPng, "png"),
            mime_type: "image/png".to_string(),
            bytes,
            width: frame.width,
            height: frame.height,
            frame_count: 1,
            degraded: false,
        };
        self.preview = Some(artifact.clone());
        self.status.set(status::MSG_GENERATE_SUCCESS);
        Ok(artifact)
    }

    /// The collage from the last `generate`, if the selection has not changed since.
    pub fn download_preview(&mut self) -> CollageResult<ExportArtifact> {
        match &self.preview {
            Some(artifact) => Ok(artifact.clone()),
            None => {
                self.status.set(status::MSG_DOWNLOAD_ERROR);
                Err(CollageError::user_input(status::MSG_DOWNLOAD_ERROR))
            }
        }
    }

    /// Run one export. A new call always restarts from `Idle`.
    #[tracing::instrument(skip(self))]
    pub async fn export(&mut self, format: ExportFormat) -> CollageResult<ExportArtifact> {
        self.transitions.clear();
        self.enter(PipelineState::Idle);

        let selected = match self.session.selected_records() {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        let any_animated = selected.iter().any(|n| n.is_animated);
        tracing::info!(selected = selected.len(), any_animated, "export requested");

        let result = match (format, any_animated) {
            (ExportFormat::Png, _) => self.static_png(&selected).await,
            (ExportFormat::Gif, false) => self.static_gif(&selected).await,
            (ExportFormat::Gif, true) => {
                self.enter(PipelineState::AnimatedImagePath);
                match self.animated_gif(&selected).await {
                    Ok(artifact) => Ok(artifact),
                    Err(e) => {
                        tracing::warn!(error = %e, "animated image path failed, degrading");
                        self.status.set(match e {
                            CollageError::Decode(_) => status::MSG_NO_FRAMES_FALLBACK,
                            _ => status::MSG_ANIMATED_FALLBACK,
                        });
                        self.static_png(&selected).await.map(degraded)
                    }
                }
            }
            (ExportFormat::Video, false) => {
                self.status.set(status::MSG_VIDEO_NOT_ANIMATED);
                self.static_png(&selected).await
            }
            (ExportFormat::Video, true) => {
                self.enter(PipelineState::VideoPath);
                match self.video(&selected).await {
                    Ok(artifact) => Ok(artifact),
                    Err(e) => {
                        tracing::warn!(error = %e, "video path failed, degrading");
                        self.status.set(status::MSG_VIDEO_FALLBACK);
                        self.static_png(&selected).await.map(degraded)
                    }
                }
            }
        };

        match result {
            Ok(artifact) => {
                self.session.set_last_output(OutputSummary {
                    kind: artifact.kind,
                    file_name: artifact.file_name.clone(),
                    byte_len: artifact.bytes.len(),
                });
                self.enter(PipelineState::Done);
                Ok(artifact)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(?state, "pipeline state");
        self.transitions.push(state.clone());
        self.state = state;
    }

    fn fail(&mut self, e: CollageError) -> CollageError {
        let msg = user_message(&e);
        self.status.set(msg.clone());
        self.enter(PipelineState::Failed(msg));
        e
    }

    async fn compositor(&self) -> GridCompositor {
        let logo = load_logo(&self.config.logo_path, self.config.timeouts.logo()).await;
        GridCompositor::new(logo, self.tiles.clone())
    }

    async fn static_png(&mut self, selected: &[NftRecord]) -> CollageResult<ExportArtifact> {
        self.enter(PipelineState::StaticPath);
        self.status.set("Generating high-quality PNG...");

        let tier = RenderTier::Hd;
        let slots = self
            .resolve_still_slots(selected, self.config.timeouts.hd_image())
            .await;
        let mut compositor = self.compositor().await;
        let frame = compositor.render_frame(&slots, tier)?;
        let bytes = encode_png(&frame, BACKGROUND_RGBA)?;

        self.status.set("High-quality PNG downloaded successfully!");
        Ok(ExportArtifact {
            kind: ArtifactKind::HdPng,
            file_name: self.namer.name(ArtifactKind::HdPng, "png"),
            mime_type: "image/png".to_string(),
            bytes,
            width: frame.width,
            height: frame.height,
            frame_count: 1,
            degraded: false,
        })
    }

    async fn static_gif(&mut self, selected: &[NftRecord]) -> CollageResult<ExportArtifact> {
        self.enter(PipelineState::StaticPath);
        self.status.set("Creating static collage GIF...");

        let slots = self
            .resolve_still_slots(selected, self.config.timeouts.preview_image())
            .await;
        let mut compositor = self.compositor().await;
        let canvas = compositor.render_frame(&slots, RenderTier::Preview)?;
        let (width, height) = (canvas.width, canvas.height);

        let frames = [TimedCanvas {
            canvas,
            duration_ms: STATIC_GIF_FRAME_MS,
        }];
        match self.gif_encoder.encode(&frames, &mut |_| {}) {
            Ok(bytes) => {
                self.status.set("Static collage GIF downloaded successfully!");
                Ok(ExportArtifact {
                    kind: ArtifactKind::StaticGif,
                    file_name: self.namer.name(ArtifactKind::StaticGif, "gif"),
                    mime_type: "image/gif".to_string(),
                    bytes,
                    width,
                    height,
                    frame_count: 1,
                    degraded: false,
                })
            }
            Err(e) if e.is_degradable() => {
                tracing::warn!(error = %e, "static GIF encode failed, degrading to PNG");
                self.status.set(status::MSG_STATIC_GIF_FALLBACK);
                self.static_png(selected).await.map(degraded)
            }
            Err(e) => Err(e),
        }
    }

    async fn animated_gif(&mut self, selected: &[NftRecord]) -> CollageResult<ExportArtifact> {
        self.status
            .set("Creating collage with real NFT animations... This may take a moment.");

        let extracted = self.extract_animated(selected).await;
        let Some(first) = extracted.iter().flatten().next().cloned() else {
            return Err(CollageError::decode(
                "no animation frames could be extracted from the selection",
            ));
        };
        let max_len = extracted.iter().flatten().map(FrameSequence::len).max().unwrap_or(1);
        let target = max_len.min(self.config.gif_max_frames);
        tracing::info!(max_len, target, "normalizing animated image frames");

        let frames = self
            .normalized_slots(selected, extracted, target, self.config.timeouts.preview_image())
            .await;
        let mut compositor = self.compositor().await;

        let mut timed = Vec::with_capacity(target);
        for f in 0..target {
            let canvas = compositor.render_frame(&frames.frame(f), RenderTier::Preview)?;
            let duration_ms = first.frames()[resample_index(f, target, first.len())].duration_ms;
            timed.push(TimedCanvas {
                canvas,
                duration_ms,
            });
        }

        let status = &mut self.status;
        let bytes = self.gif_encoder.encode(&timed, &mut |p| {
            status.set(format!("Rendering GIF: {}%", (p * 100.0).round() as u32));
        })?;

        self.status
            .set("Animated collage with real NFT animations downloaded successfully!");
        let size = RenderTier::Preview.canvas_size();
        Ok(ExportArtifact {
            kind: ArtifactKind::AnimatedGif,
            file_name: self.namer.name(ArtifactKind::AnimatedGif, "gif"),
            mime_type: "image/gif".to_string(),
            bytes,
            width: size,
            height: size,
            frame_count: target,
            degraded: false,
        })
    }

    async fn video(&mut self, selected: &[NftRecord]) -> CollageResult<ExportArtifact> {
        self.status
            .set("Detected animated NFTs! Extracting real animation frames for video...");

        let base = self.config.video.base_frames;
        let extracted = self.extract_animated(selected).await;
        let frames = self
            .normalized_slots(selected, extracted, base, self.config.timeouts.preview_image())
            .await;
        let mut compositor = self.compositor().await;

        self.status.set("Warming up recording...");
        let mut scheduler = (self.schedulers)(self.config.video.fps);
        let recorder = Recorder::new(self.capture.as_ref(), &self.config.video);
        let status = &mut self.status;
        let video = recorder
            .record(&mut compositor, &frames, scheduler.as_mut(), &mut |p| {
                status.set(format!("Recording: {p}%"));
            })
            .await?;

        self.status.set("Animated video downloaded successfully!");
        let size = RenderTier::Video.canvas_size();
        Ok(ExportArtifact {
            kind: ArtifactKind::Video,
            file_name: self
                .namer
                .name(ArtifactKind::Video, video.codec.file_extension()),
            mime_type: video.codec.mime_type().to_string(),
            bytes: video.bytes,
            width: size,
            height: size,
            frame_count: video.frames_captured as usize,
            degraded: false,
        })
    }

    /// Frame sequences for animated selections, in selection order. Runs concurrently.
    async fn extract_animated(&self, selected: &[NftRecord]) -> Vec<Option<FrameSequence>> {
        let extractor =
            FrameExtractor::new(self.fetcher.clone(), self.config.timeouts.extract_fetch());
        let jobs = selected.iter().map(|nft| {
            let extractor = extractor.clone();
            async move {
                match (nft.is_animated, nft.animation_source()) {
                    (true, Some(src)) => extractor.extract(src).await,
                    _ => None,
                }
            }
        });
        let out = join_all(jobs).await;
        tracing::info!(
            animated = selected.iter().filter(|n| n.is_animated).count(),
            extracted = out.iter().flatten().count(),
            "frame extraction finished"
        );
        out
    }

    /// Build per-slot aligned frames: extracted sequences animate, everything else is resolved
    /// once as a still (placeholder on failure).
    async fn normalized_slots(
        &self,
        selected: &[NftRecord],
        extracted: Vec<Option<FrameSequence>>,
        target: usize,
        timeout: Duration,
    ) -> SlotFrames {
        let stills = self.resolve_selection(selected, timeout).await;

        let mut sources = BTreeMap::new();
        let items: Vec<(SlotImage, Option<FrameSequence>)> =
            stills.into_iter().zip(extracted).collect();
        for (slot, content) in slot_assignments(&items).into_iter().enumerate() {
            let source = match content {
                SlotContent::Logo => SlotSource::Still(SlotImage::Logo),
                SlotContent::Item((_, Some(seq))) => SlotSource::Animated(seq.clone()),
                SlotContent::Item((still, None)) => SlotSource::Still(still.clone()),
            };
            sources.insert(slot, source);
        }
        SlotFrames::from_normalized(normalize(&sources, target), target)
    }

    async fn resolve_still_slots(
        &self,
        selected: &[NftRecord],
        timeout: Duration,
    ) -> [SlotImage; GRID_SLOTS] {
        let stills = self.resolve_selection(selected, timeout).await;
        slot_assignments(&stills).map(|content| match content {
            SlotContent::Logo => SlotImage::Logo,
            SlotContent::Item(image) => image.clone(),
        })
    }

    /// Resolve every selected NFT's still image concurrently.
    async fn resolve_selection(&self, selected: &[NftRecord], timeout: Duration) -> Vec<SlotImage> {
        let fetcher = self.fetcher.as_ref();
        let jobs = selected.iter().map(|nft| async move {
            match resolve_bitmap(fetcher, nft.image_url.as_deref(), timeout).await {
                Resolved::Ready(bitmap) => SlotImage::Image(bitmap),
                Resolved::Unavailable => SlotImage::Unavailable {
                    name: nft.name.clone(),
                },
            }
        });
        join_all(jobs).await
    }
}

fn degraded(mut artifact: ExportArtifact) -> ExportArtifact {
    artifact.degraded = true;
    artifact
}

/// Status-line text for an error: user input errors verbatim, everything else generic.
fn user_message(e: &CollageError) -> String {
    match e {
        CollageError::UserInput(msg) => msg.clone(),
        other => format!("Failed to generate collage: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_messages_pass_through() {
        assert_eq!(
            user_message(&CollageError::user_input("Please select at least 2 NFTs")),
            "Please select at least 2 NFTs"
        );
        assert!(user_message(&CollageError::encode("x")).starts_with("Failed to generate collage"));
    }

    #[test]
    fn degraded_marks_artifact() {
        let a = ExportArtifact {
            kind: ArtifactKind::HdPng,
            file_name: String::new(),
            mime_type: String::new(),
            bytes: Vec::new(),
            width: 0,
            height: 0,
            frame_count: 0,
            degraded: false,
        };
        assert!(degraded(a).degraded);
    }
}
