/// `round(a * b / 255)` for 8-bit channel values.
#[inline]
fn scale255(a: u8, b: u8) -> u8 {
    let p = u32::from(a) * u32::from(b) + 128;
    ((p + (p >> 8)) >> 8) as u8
}

/// Straight RGBA8 -> premultiplied RGBA8.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        if a != 255 {
            for c in &mut px[..3] {
                *c = scale255(*c, a);
            }
        }
    }
}

/// Composite premultiplied `src` over the opaque `bg_rgba` into `dst`.
///
/// Returns `false` when the buffers differ in length or are not whole pixels.
pub(crate) fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) -> bool {
    if dst.len() != src.len() || src.len() % 4 != 0 {
        return false;
    }
    for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let uncovered = 255 - px[3];
        for c in 0..3 {
            out[c] = px[c].saturating_add(scale255(bg_rgba[c], uncovered));
        }
        out[3] = 255;
    }
    true
}
