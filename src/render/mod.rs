//! 3x3 collage compositing on a `tiny_skia` canvas.

pub mod grid;
pub mod tiles;

pub use grid::{
    GRID_SLOTS, GridCompositor, RenderTier, SlotContent, SlotImage, TierMetrics, slot_assignments,
    slot_origin,
};
pub use tiles::{TileRenderer, truncate_name};
