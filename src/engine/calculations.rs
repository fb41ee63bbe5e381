//! Pure calculation functions for image dimensions and placement.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Anchor;

/// Resolve requested dimensions against the source, filling in a missing
/// edge from the source aspect ratio.
///
/// Returns `None` when neither edge was requested (no resize).
pub fn resolve_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let aspect = src_w as f64 / src_h.max(1) as f64;
    match (width, height) {
        (None, None) => None,
        (Some(w), Some(h)) => Some((w.max(1), h.max(1))),
        (Some(w), None) => Some((w.max(1), ((w as f64 / aspect).round() as u32).max(1))),
        (None, Some(h)) => Some((((h as f64 * aspect).round() as u32).max(1), h.max(1))),
    }
}

/// Multiply requested dimensions by the device pixel ratio.
pub fn apply_pixel_ratio(dimension: Option<u32>, dpr: f64) -> Option<u32> {
    dimension.map(|d| (d as f64 * dpr).round() as u32)
}

/// Largest dimensions that fit inside `target` while keeping the source
/// aspect ratio.
pub fn calculate_contain_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale = (tgt_w as f64 / src_w.max(1) as f64).min(tgt_h as f64 / src_h.max(1) as f64);
    (
        ((src_w as f64 * scale).round() as u32).max(1),
        ((src_h as f64 * scale).round() as u32).max(1),
    )
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h.max(1) as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h.max(1) as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Top-left offset of an `item` placed inside a `container` at `anchor`.
///
/// `padding` pushes the item away from the edges it is anchored to. Offsets
/// may be negative when the item is larger than the container.
pub fn anchor_offset(
    container: (u32, u32),
    item: (u32, u32),
    anchor: Anchor,
    padding: (u32, u32),
) -> (i64, i64) {
    let free_x = container.0 as i64 - item.0 as i64;
    let free_y = container.1 as i64 - item.1 as i64;
    let (pad_x, pad_y) = (padding.0 as i64, padding.1 as i64);

    let (fx, fy) = anchor.fractions();
    let x = if fx == 0.0 {
        pad_x
    } else if fx == 1.0 {
        free_x - pad_x
    } else {
        (free_x as f64 * fx).round() as i64
    };
    let y = if fy == 0.0 {
        pad_y
    } else if fy == 1.0 {
        free_y - pad_y
    } else {
        (free_y as f64 * fy).round() as i64
    };
    (x, y)
}
