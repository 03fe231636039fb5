//! Badge placement on the poster.

use image::{imageops, RgbaImage};

use crate::style::{Anchor, Corner};

/// Top-left origin for a badge of `(w, h)` on a poster of `(poster_w,
/// poster_h)` at the given anchor. Flush anchors drop the edge padding.
///
/// Oversized badges clamp to the poster's origin edge rather than going
/// negative.
pub fn placement_origin(
    poster_w: u32,
    poster_h: u32,
    w: u32,
    h: u32,
    anchor: Anchor,
    edge_padding: u32,
) -> (i64, i64) {
    let p = if anchor.flush { 0 } else { edge_padding } as i64;
    let (pw, ph) = (poster_w as i64, poster_h as i64);
    let (w, h) = (w as i64, h as i64);

    let x = match anchor.corner {
        Corner::TopLeft | Corner::BottomLeft => p,
        Corner::TopRight | Corner::BottomRight => (pw - w - p).max(0),
    };
    let y = match anchor.corner {
        Corner::TopLeft | Corner::TopRight => p,
        Corner::BottomLeft | Corner::BottomRight => (ph - h - p).max(0),
    };
    (x, y)
}

/// Alpha-composite a badge onto the poster at its anchor.
pub fn place_at(poster: &mut RgbaImage, badge: &RgbaImage, anchor: Anchor, edge_padding: u32) {
    let (x, y) = placement_origin(
        poster.width(),
        poster.height(),
        badge.width(),
        badge.height(),
        anchor,
        edge_padding,
    );
    imageops::overlay(poster, badge, x, y);
}
