//! Drawn tiles: the logo fallback and the per-slot "unavailable" placeholder.
//!
//! Both are small SVG documents rasterized with `resvg`, so text goes through the same
//! font stack as any other SVG text.

use std::path::Path;
use std::sync::Arc;

use resvg::tiny_skia;

use crate::foundation::core::Bitmap;
use crate::foundation::error::{CollageError, CollageResult};
use crate::render::grid::TierMetrics;

const FONT_FAMILY: &str = "Efour DigiPro, Arial, sans-serif";
const NAME_MAX_CHARS: usize = 8;

#[derive(Clone)]
pub struct TileRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl TileRenderer {
    /// System fonts plus any `.ttf`/`.otf`/`.ttc` files directly inside `font_dir`.
    pub fn new(font_dir: Option<&Path>) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = font_dir {
            load_fonts_from_dir(&mut db, dir);
        }

        // Pin the generic family to something that exists so text never silently vanishes.
        let query = usvg::fontdb::Query {
            families: &[usvg::fontdb::Family::SansSerif],
            ..Default::default()
        };
        if db.query(&query).is_none() {
            let fallback = db
                .faces()
                .find_map(|face| face.families.first().map(|(name, _)| name.clone()));
            if let Some(name) = fallback {
                db.set_sans_serif_family(name);
            }
        }

        tracing::debug!(faces = db.len(), "tile font database ready");
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// Diagonal `#667eea -> #764ba2` gradient with "STABLE" / "LOGO" in white.
    pub fn logo_fallback(&self, m: TierMetrics) -> CollageResult<Bitmap> {
        let size = m.cell;
        let mid = f64::from(size) / 2.0;
        let off = f64::from(m.logo_text_offset);
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">
<defs><linearGradient id="g" x1="0" y1="0" x2="1" y2="1">
<stop offset="0" stop-color="#667eea"/><stop offset="1" stop-color="#764ba2"/>
</linearGradient></defs>
<rect width="{size}" height="{size}" fill="url(#g)"/>
<g font-family="{FONT_FAMILY}" font-weight="bold" font-size="{fs}" fill="#ffffff" text-anchor="middle" dominant-baseline="central">
<text x="{mid}" y="{top}">STABLE</text>
<text x="{mid}" y="{bottom}">LOGO</text>
</g></svg>"##,
            fs = m.logo_text,
            top = mid - off,
            bottom = mid + off,
        );
        self.rasterize(&svg, size)
    }

    /// `#252536` fill with the truncated name in `#718096`. The white border is stroked by the
    /// compositor so it can overlap neighbouring cells.
    pub fn placeholder(&self, m: TierMetrics, name: &str) -> CollageResult<Bitmap> {
        let size = m.cell;
        let mid = f64::from(size) / 2.0;
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">
<rect width="{size}" height="{size}" fill="#252536"/>
<text x="{mid}" y="{mid}" font-family="{FONT_FAMILY}" font-weight="bold" font-size="{fs}" fill="#718096" text-anchor="middle" dominant-baseline="central">{text}</text>
</svg>"##,
            fs = m.text,
            text = xml_escape(&truncate_name(name)),
        );
        self.rasterize(&svg, size)
    }

    fn rasterize(&self, svg: &str, size: u32) -> CollageResult<Bitmap> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &opts)
            .map_err(|e| CollageError::decode(format!("tile svg: {e}")))?;
        let mut pixmap = tiny_skia::Pixmap::new(size, size)
            .ok_or_else(|| CollageError::validation("failed to allocate tile pixmap"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        Ok(Bitmap::from_pixmap(pixmap))
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        if matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc") {
            let _ = db.load_font_file(&path);
        }
    }
}

/// Names longer than eight characters become the first eight plus `"..."`.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_MAX_CHARS {
        let head: String = name.chars().take(NAME_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
