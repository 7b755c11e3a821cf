use std::collections::HashMap;

use resvg::tiny_skia;

use crate::foundation::core::{Bitmap, CanvasFrame};
use crate::foundation::error::{CollageError, CollageResult};
use crate::render::tiles::TileRenderer;

pub const GRID_SLOTS: usize = 9;
const GRID_DIM: u32 = 3;

pub const BACKGROUND_RGBA: [u8; 4] = [0x1e, 0x1e, 0x2f, 0xff];

/// Output resolution class. Layout is identical up to scale; only sizes and line weights differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTier {
    /// 600x600 still and animated-image output.
    Preview,
    /// 600x600 with heavier grid lines for realtime capture.
    Video,
    /// 2400x2400 still output.
    Hd,
}

/// Pixel measures for one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierMetrics {
    pub cell: u32,
    pub grid_line: u32,
    pub border: u32,
    pub placeholder_border: u32,
    /// Placeholder name text size.
    pub text: u32,
    /// Logo fallback text size and its vertical offset from the cell centre.
    pub logo_text: u32,
    pub logo_text_offset: u32,
}

impl TierMetrics {
    pub fn canvas_size(self) -> u32 {
        self.cell * GRID_DIM
    }
}

impl RenderTier {
    pub fn metrics(self) -> TierMetrics {
        match self {
            Self::Preview => TierMetrics {
                cell: 200,
                grid_line: 8,
                border: 10,
                placeholder_border: 6,
                text: 14,
                logo_text: 16,
                logo_text_offset: 10,
            },
            Self::Video => TierMetrics {
                grid_line: 16,
                border: 18,
                ..Self::Preview.metrics()
            },
            Self::Hd => TierMetrics {
                cell: 800,
                grid_line: 32,
                border: 40,
                placeholder_border: 24,
                text: 56,
                logo_text: 64,
                logo_text_offset: 40,
            },
        }
    }

    pub fn canvas_size(self) -> u32 {
        self.metrics().canvas_size()
    }
}

/// What a grid slot shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotImage {
    /// The fixed logo tile (or its drawn fallback).
    Logo,
    Image(Bitmap),
    /// Source failed to resolve; drawn as a placeholder carrying the display name.
    Unavailable { name: String },
}

/// Slot role before any image is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotContent<T> {
    Logo,
    Item(T),
}

/// Slot 0 is always the logo; slots 1..=8 follow selection order; slots past the selection
/// fall back to the logo. Entries beyond the eighth are ignored.
pub fn slot_assignments<T>(selection: &[T]) -> [SlotContent<&T>; GRID_SLOTS] {
    std::array::from_fn(|slot| match slot {
        0 => SlotContent::Logo,
        n => selection
            .get(n - 1)
            .map_or(SlotContent::Logo, SlotContent::Item),
    })
}

/// Top-left pixel of `slot` for a given cell size (row = slot / 3, col = slot % 3).
pub fn slot_origin(slot: usize, cell: u32) -> (u32, u32) {
    let slot = slot as u32;
    ((slot % GRID_DIM) * cell, (slot / GRID_DIM) * cell)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TileKey {
    LogoFallback(RenderTier),
    Placeholder(RenderTier, String),
}

/// Draws whole collage frames. Owns the logo bitmap and a cache of drawn tiles.
pub struct GridCompositor {
    logo: Option<Bitmap>,
    tiles: TileRenderer,
    tile_cache: HashMap<TileKey, Bitmap>,
}

impl GridCompositor {
    /// `logo = None` selects the gradient fallback tile.
    pub fn new(logo: Option<Bitmap>, tiles: TileRenderer) -> Self {
        Self {
            logo,
            tiles,
            tile_cache: HashMap::new(),
        }
    }

    /// Fresh transparent canvas sized for `tier`.
    pub fn new_canvas(tier: RenderTier) -> CollageResult<tiny_skia::Pixmap> {
        let size = tier.canvas_size();
        tiny_skia::Pixmap::new(size, size)
            .ok_or_else(|| CollageError::validation(format!("failed to allocate {size}x{size} canvas")))
    }

    pub fn render_frame(
        &mut self,
        slots: &[SlotImage; GRID_SLOTS],
        tier: RenderTier,
    ) -> CollageResult<CanvasFrame> {
        let mut canvas = Self::new_canvas(tier)?;
        self.render_into(slots, tier, &mut canvas)?;
        Ok(CanvasFrame::from_pixmap(&canvas))
    }

    /// Redraw the whole canvas: background, slot 0, slots 1..=8, interior grid lines, outer border.
    pub fn render_into(
        &mut self,
        slots: &[SlotImage; GRID_SLOTS],
        tier: RenderTier,
        canvas: &mut tiny_skia::Pixmap,
    ) -> CollageResult<()> {
        let m = tier.metrics();
        let size = m.canvas_size();
        if canvas.width() != size || canvas.height() != size {
            return Err(CollageError::validation(format!(
                "canvas is {}x{}, tier needs {size}x{size}",
                canvas.width(),
                canvas.height()
            )));
        }

        let [r, g, b, a] = BACKGROUND_RGBA;
        canvas.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        // Slot 0 is the logo regardless of what the caller passed.
        self.draw_logo(canvas, tier, 0)?;
        for (slot, image) in slots.iter().enumerate().skip(1) {
            match image {
                SlotImage::Logo => self.draw_logo(canvas, tier, slot)?,
                SlotImage::Image(bitmap) => draw_bitmap(canvas, bitmap, slot, m.cell),
                SlotImage::Unavailable { name } => self.draw_placeholder(canvas, tier, slot, name)?,
            }
        }

        let white = white_paint();
        let grid = tiny_skia::Stroke {
            width: m.grid_line as f32,
            ..Default::default()
        };
        let mut pb = tiny_skia::PathBuilder::new();
        for i in 1..GRID_DIM {
            let at = (i * m.cell) as f32;
            pb.move_to(at, 0.0);
            pb.line_to(at, size as f32);
            pb.move_to(0.0, at);
            pb.line_to(size as f32, at);
        }
        if let Some(lines) = pb.finish() {
            canvas.stroke_path(&lines, &white, &grid, tiny_skia::Transform::identity(), None);
        }

        stroke_rect(canvas, 0, 0, size, m.border);
        Ok(())
    }

    fn draw_logo(
        &mut self,
        canvas: &mut tiny_skia::Pixmap,
        tier: RenderTier,
        slot: usize,
    ) -> CollageResult<()> {
        let cell = tier.metrics().cell;
        if let Some(logo) = &self.logo {
            draw_bitmap(canvas, logo, slot, cell);
            return Ok(());
        }
        let tile = self.cached_tile(TileKey::LogoFallback(tier))?;
        draw_bitmap(canvas, &tile, slot, cell);
        Ok(())
    }

    fn draw_placeholder(
        &mut self,
        canvas: &mut tiny_skia::Pixmap,
        tier: RenderTier,
        slot: usize,
        name: &str,
    ) -> CollageResult<()> {
        let m = tier.metrics();
        let tile = self.cached_tile(TileKey::Placeholder(tier, name.to_string()))?;
        draw_bitmap(canvas, &tile, slot, m.cell);
        let (x, y) = slot_origin(slot, m.cell);
        stroke_rect(canvas, x, y, m.cell, m.placeholder_border);
        Ok(())
    }

    fn cached_tile(&mut self, key: TileKey) -> CollageResult<Bitmap> {
        if let Some(tile) = self.tile_cache.get(&key) {
            return Ok(tile.clone());
        }
        let tile = match &key {
            TileKey::LogoFallback(tier) => self.tiles.logo_fallback(tier.metrics())?,
            TileKey::Placeholder(tier, name) => self.tiles.placeholder(tier.metrics(), name)?,
        };
        self.tile_cache.insert(key, tile.clone());
        Ok(tile)
    }
}

fn white_paint() -> tiny_skia::Paint<'static> {
    let mut paint = tiny_skia::Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;
    paint
}

/// Stretch `bitmap` over the full cell.
fn draw_bitmap(canvas: &mut tiny_skia::Pixmap, bitmap: &Bitmap, slot: usize, cell: u32) {
    let Some(src) = bitmap.as_pixmap() else {
        tracing::warn!(slot, "bitmap storage does not form a pixmap, slot left empty");
        return;
    };
    let (x, y) = slot_origin(slot, cell);
    let sx = cell as f32 / bitmap.width as f32;
    let sy = cell as f32 / bitmap.height as f32;
    let paint = tiny_skia::PixmapPaint {
        quality: tiny_skia::FilterQuality::Bilinear,
        ..Default::default()
    };
    canvas.draw_pixmap(
        0,
        0,
        src,
        &paint,
        tiny_skia::Transform::from_row(sx, 0.0, 0.0, sy, x as f32, y as f32),
        None,
    );
}

/// Stroke centred on the rectangle edge, half inside and half outside.
fn stroke_rect(canvas: &mut tiny_skia::Pixmap, x: u32, y: u32, size: u32, width: u32) {
    let Some(rect) = tiny_skia::Rect::from_xywh(x as f32, y as f32, size as f32, size as f32)
    else {
        return;
    };
    let path = tiny_skia::PathBuilder::from_rect(rect);
    let stroke = tiny_skia::Stroke {
        width: width as f32,
        ..Default::default()
    };
    canvas.stroke_path(
        &path,
        &white_paint(),
        &stroke,
        tiny_skia::Transform::identity(),
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compositor(logo: Option<Bitmap>) -> GridCompositor {
        GridCompositor::new(logo, TileRenderer::new(None))
    }

    fn pixel(frame: &CanvasFrame, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        [frame.data[i], frame.data[i + 1], frame.data[i + 2], frame.data[i + 3]]
    }

    #[test]
    fn assignments_fill_with_logo() {
        for n in 2..=8usize {
            let sel: Vec<usize> = (0..n).collect();
            let slots = slot_assignments(&sel);
            assert_eq!(slots.len(), 9);
            assert_eq!(slots[0], SlotContent::Logo);
            for (i, slot) in slots.iter().enumerate().skip(1) {
                if i <= n {
                    assert_eq!(*slot, SlotContent::Item(&(i - 1)));
                } else {
                    assert_eq!(*slot, SlotContent::Logo);
                }
            }
        }
    }

    #[test]
    fn origins_follow_row_major_order() {
        assert_eq!(slot_origin(0, 200), (0, 0));
        assert_eq!(slot_origin(4, 200), (200, 200));
        assert_eq!(slot_origin(5, 200), (400, 200));
        assert_eq!(slot_origin(7, 800), (800, 1600));
    }

    #[test]
    fn tiers_scale_by_four() {
        let p = RenderTier::Preview.metrics();
        let h = RenderTier::Hd.metrics();
        assert_eq!(p.canvas_size(), 600);
        assert_eq!(h.canvas_size(), 2400);
        assert_eq!(
            (h.grid_line, h.border, h.placeholder_border, h.text),
            (p.grid_line * 4, p.border * 4, p.placeholder_border * 4, p.text * 4)
        );
        let v = RenderTier::Video.metrics();
        assert_eq!((v.cell, v.grid_line, v.border), (200, 16, 18));
    }

    #[test]
    fn images_fill_their_cells_under_the_grid() {
        let red = Bitmap::solid(4, 4, [255, 0, 0, 255]).unwrap();
        let logo = Bitmap::solid(8, 8, [0, 255, 0, 255]).unwrap();
        let mut slots: [SlotImage; GRID_SLOTS] = std::array::from_fn(|_| SlotImage::Logo);
        slots[4] = SlotImage::Image(red);

        let frame = compositor(Some(logo))
            .render_frame(&slots, RenderTier::Preview)
            .unwrap();
        assert_eq!((frame.width, frame.height), (600, 600));
        assert_eq!(pixel(&frame, 300, 300), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 100, 100), [0, 255, 0, 255]);
        // Interior grid line at x = 200 and outer border at the edge.
        assert_eq!(pixel(&frame, 200, 300), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 1, 300), [255, 255, 255, 255]);
    }

    #[test]
    fn unavailable_slot_draws_placeholder_surface() {
        let mut slots: [SlotImage; GRID_SLOTS] = std::array::from_fn(|_| SlotImage::Logo);
        slots[8] = SlotImage::Unavailable {
            name: "NODES #42".to_string(),
        };
        let frame = compositor(None)
            .render_frame(&slots, RenderTier::Preview)
            .unwrap();
        assert_eq!(pixel(&frame, 420, 420), [0x25, 0x25, 0x36, 255]);
    }

    #[test]
    fn slot_zero_is_always_logo() {
        let logo = Bitmap::solid(2, 2, [0, 0, 255, 255]).unwrap();
        let mut slots: [SlotImage; GRID_SLOTS] = std::array::from_fn(|_| SlotImage::Logo);
        slots[0] = SlotImage::Image(Bitmap::solid(2, 2, [255, 0, 0, 255]).unwrap());
        let frame = compositor(Some(logo))
            .render_frame(&slots, RenderTier::Preview)
            .unwrap();
        assert_eq!(pixel(&frame, 100, 100), [0, 0, 255, 255]);
    }

    #[test]
    fn rejects_mismatched_canvas() {
        let slots: [SlotImage; GRID_SLOTS] = std::array::from_fn(|_| SlotImage::Logo);
        let mut canvas = tiny_skia::Pixmap::new(10, 10).unwrap();
        let err = compositor(None)
            .render_into(&slots, RenderTier::Preview, &mut canvas)
            .unwrap_err();
        assert!(matches!(err, CollageError::Validation(_)));
    }
}
