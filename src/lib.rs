//! NODES collage maker.
//!
//! Composes up to eight owned NFTs plus a fixed logo tile into a 3x3 grid and exports it as:
//!
//! - a 2400x2400 PNG
//! - a GIF (single frame, or animated when any selected token animates)
//! - a two-second looping WebM recorded tick by tick
//!
//! The [`CollagePipeline`] owns the session and decides which path an export takes, degrading to
//! the PNG when an animated path fails. [`relay`] is the small CORS fetch relay used to pull
//! cross-origin media.
#![forbid(unsafe_code)]

pub mod animation;
pub mod assets;
/// Output encoders and frame sinks.
pub mod encode;
mod foundation;
pub mod nft;
pub mod pipeline;
/// Tick-paced video recording.
pub mod record;
/// CORS fetch relay.
pub mod relay;
pub mod render;

pub use crate::foundation::config::{CollageConfig, RelayConfig, TimeoutConfig, VideoConfig};
pub use crate::foundation::core::{Bitmap, CanvasFrame};
pub use crate::foundation::error::{CollageError, CollageResult};

pub use crate::assets::{HttpSourceFetcher, SourceFetcher};
pub use crate::encode::codec::VideoCodec;
pub use crate::nft::{AlchemyClient, NftRecord, OwnershipSource};
pub use crate::pipeline::{
    ArtifactKind, CollagePipeline, ExportArtifact, ExportFormat, PipelineState,
};
pub use crate::render::{GridCompositor, RenderTier, SlotImage};
