//! Poster renderer: badge instances in, badged poster bytes out.

use std::io::Cursor;
use std::path::PathBuf;

use image::{ImageFormat, RgbaImage};

use aph_core::{BadgeType, Error, Result};

use crate::catalog::BadgeInstance;
use crate::compose::compose_badge;
use crate::font::FontLibrary;
use crate::layout::{stack_badges, LayoutDirection};
use crate::place::place_at;
use crate::style::Anchor;

/// Gap between stacked badges sharing an anchor.
const STACK_GAP: u32 = 10;

/// Result of one render pass.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Encoded poster bytes (original bytes when nothing was applied).
    pub bytes: Vec<u8>,
    /// Content type of `bytes`.
    pub mime: String,
    /// Badge types successfully composited, deduplicated, in input order.
    pub applied: Vec<BadgeType>,
    /// Badges skipped during composition, with the failure kind.
    pub skipped: Vec<(BadgeType, String)>,
}

/// Composites badges onto posters.
///
/// Per-badge failures (missing asset, missing font) degrade to skipping
/// that badge; only an undecodable poster fails the render.
pub struct Renderer {
    fonts: FontLibrary,
    asset_dir: PathBuf,
    edge_padding: u32,
    stack_direction: LayoutDirection,
}

impl Renderer {
    pub fn new(
        fonts: FontLibrary,
        asset_dir: PathBuf,
        edge_padding: u32,
        stack_direction: LayoutDirection,
    ) -> Self {
        Self {
            fonts,
            asset_dir,
            edge_padding,
            stack_direction,
        }
    }

    /// Render `instances` onto `poster_bytes`.
    ///
    /// # Errors
    ///
    /// `image_invalid` when the poster bytes do not decode.
    pub fn render(&self, poster_bytes: &[u8], instances: &[BadgeInstance]) -> Result<RenderOutcome> {
        let format = image::guess_format(poster_bytes)
            .map_err(|e| Error::ImageInvalid(format!("unrecognized poster format: {e}")))?;
        let mut poster = image::load_from_memory(poster_bytes)
            .map_err(|e| Error::ImageInvalid(format!("poster failed to decode: {e}")))?
            .to_rgba8();

        // Compose every badge, grouping survivors by anchor in first-seen
        // order so multi-badge layouts stay deterministic.
        let mut groups: Vec<(Anchor, Vec<RgbaImage>)> = Vec::new();
        let mut applied: Vec<BadgeType> = Vec::new();
        let mut skipped: Vec<(BadgeType, String)> = Vec::new();

        for instance in instances {
            match compose_badge(&instance.visual, &instance.style, &self.fonts, &self.asset_dir) {
                Ok(bitmap) => {
                    if !applied.contains(&instance.badge_type) {
                        applied.push(instance.badge_type);
                    }
                    match groups.iter_mut().find(|(a, _)| *a == instance.anchor) {
                        Some((_, list)) => list.push(bitmap),
                        None => groups.push((instance.anchor, vec![bitmap])),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        badge = %instance.badge_type,
                        error = %e,
                        "skipping badge"
                    );
                    skipped.push((instance.badge_type, e.kind().as_str().to_string()));
                }
            }
        }

        if groups.is_empty() {
            // Nothing composited: hand the original bytes back untouched.
            return Ok(RenderOutcome {
                bytes: poster_bytes.to_vec(),
                mime: mime_for(format).to_string(),
                applied,
                skipped,
            });
        }

        for (anchor, badges) in groups {
            let unit = stack_badges(badges, self.stack_direction, STACK_GAP);
            place_at(&mut poster, &unit, anchor, self.edge_padding);
        }

        let (bytes, mime) = encode(poster, format)?;
        Ok(RenderOutcome {
            bytes,
            mime,
            applied,
            skipped,
        })
    }
}

/// Re-encode the poster in (a close relative of) its input format.
fn encode(poster: RgbaImage, format: ImageFormat) -> Result<(Vec<u8>, String)> {
    // JPEG has no alpha channel; WebP encoding support is not universal.
    // PNG keeps PNG; everything else goes out as JPEG.
    let (format, mime) = match format {
        ImageFormat::Png => (ImageFormat::Png, "image/png"),
        _ => (ImageFormat::Jpeg, "image/jpeg"),
    };

    let mut buf = Cursor::new(Vec::new());
    let dynamic = image::DynamicImage::ImageRgba8(poster);
    let out = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(dynamic.to_rgb8())
    } else {
        dynamic
    };
    out.write_to(&mut buf, format)
        .map_err(|e| Error::RenderFailed(format!("encode failed: {e}")))?;
    Ok((buf.into_inner(), mime.to_string()))
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        _ => "image/jpeg",
    }
}
