//! Multi-badge sub-layout.
//!
//! Badges sharing an anchor (typically reviews) are stacked into one bitmap
//! and placed as a unit.

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

/// Stacking direction for a shared-anchor group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    #[default]
    Vertical,
    Horizontal,
}

/// Stack badge bitmaps with a fixed gap. Single-element input is returned
/// unchanged.
pub fn stack_badges(badges: Vec<RgbaImage>, direction: LayoutDirection, gap: u32) -> RgbaImage {
    if badges.is_empty() {
        return RgbaImage::new(1, 1);
    }
    if badges.len() == 1 {
        return badges.into_iter().next().expect("one badge");
    }

    let gaps = gap * (badges.len() as u32 - 1);
    let (w, h) = match direction {
        LayoutDirection::Vertical => (
            badges.iter().map(RgbaImage::width).max().unwrap_or(1),
            badges.iter().map(RgbaImage::height).sum::<u32>() + gaps,
        ),
        LayoutDirection::Horizontal => (
            badges.iter().map(RgbaImage::width).sum::<u32>() + gaps,
            badges.iter().map(RgbaImage::height).max().unwrap_or(1),
        ),
    };

    let mut canvas = RgbaImage::new(w, h);
    let mut cursor = 0i64;
    for badge in &badges {
        match direction {
            LayoutDirection::Vertical => {
                imageops::overlay(&mut canvas, badge, 0, cursor);
                cursor += i64::from(badge.height() + gap);
            }
            LayoutDirection::Horizontal => {
                imageops::overlay(&mut canvas, badge, cursor, 0);
                cursor += i64::from(badge.width() + gap);
            }
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn vertical_stack_dimensions() {
        let stacked = stack_badges(
            vec![badge(100, 40), badge(80, 40), badge(120, 40)],
            LayoutDirection::Vertical,
            10,
        );
        assert_eq!(stacked.width(), 120);
        assert_eq!(stacked.height(), 40 * 3 + 10 * 2);
    }

    #[test]
    fn horizontal_stack_dimensions() {
        let stacked = stack_badges(
            vec![badge(50, 30), badge(50, 60)],
            LayoutDirection::Horizontal,
            8,
        );
        assert_eq!(stacked.width(), 50 * 2 + 8);
        assert_eq!(stacked.height(), 60);
    }

    #[test]
    fn single_badge_passthrough() {
        let stacked = stack_badges(vec![badge(33, 44)], LayoutDirection::Vertical, 10);
        assert_eq!(stacked.dimensions(), (33, 44));
    }

    #[test]
    fn gap_pixels_are_transparent() {
        let stacked = stack_badges(
            vec![badge(10, 10), badge(10, 10)],
            LayoutDirection::Vertical,
            4,
        );
        // A pixel inside the gap band.
        assert_eq!(stacked.get_pixel(5, 11)[3], 0);
        // Pixels inside badges are opaque.
        assert_eq!(stacked.get_pixel(5, 5)[3], 255);
        assert_eq!(stacked.get_pixel(5, 15)[3], 255);
    }
}
