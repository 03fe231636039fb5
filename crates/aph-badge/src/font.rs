//! Font loading, fallback, caching, and text measurement.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};

use aph_core::{Error, Result};

/// Well-known system font locations probed as the last fallback step.
const SYSTEM_FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// Loads fonts by file name from a search path with deterministic fallback:
/// requested font → configured fallback → any font in the search path →
/// platform default. Loaded faces are cached by resolved path.
pub struct FontLibrary {
    search_dirs: Vec<PathBuf>,
    fallback: Option<String>,
    cache: Mutex<HashMap<PathBuf, Arc<FontVec>>>,
}

impl FontLibrary {
    pub fn new(search_dirs: Vec<PathBuf>, fallback: Option<String>) -> Self {
        Self {
            search_dirs,
            fallback,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load a font by file name, walking the fallback chain.
    pub fn load(&self, name: &str) -> Result<Arc<FontVec>> {
        let path = self
            .resolve(name)
            .ok_or_else(|| Error::RenderFontMissing(name.to_string()))?;
        self.load_path(&path)
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        // 1. The requested name in the search path.
        if let Some(path) = self.find_in_dirs(name) {
            return Some(path);
        }
        // 2. The configured fallback name.
        if let Some(fallback) = self.fallback.as_deref() {
            if fallback != name {
                if let Some(path) = self.find_in_dirs(fallback) {
                    tracing::debug!(requested = name, fallback, "using fallback font");
                    return Some(path);
                }
            }
        }
        // 3. Any font file in the search path, lexicographically first so
        //    the choice is deterministic.
        let mut candidates: Vec<PathBuf> = self
            .search_dirs
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("ttf") | Some("otf") | Some("ttc")
                )
            })
            .collect();
        candidates.sort();
        if let Some(path) = candidates.into_iter().next() {
            return Some(path);
        }
        // 4. Platform default.
        SYSTEM_FONT_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    fn find_in_dirs(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|p| p.exists())
    }

    fn load_path(&self, path: &Path) -> Result<Arc<FontVec>> {
        if let Some(font) = self.cache.lock().expect("font cache poisoned").get(path) {
            return Ok(font.clone());
        }

        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| Error::RenderFontMissing(format!("unparsable font: {}", path.display())))?;
        let font = Arc::new(font);
        self.cache
            .lock()
            .expect("font cache poisoned")
            .insert(path.to_path_buf(), font.clone());
        Ok(font)
    }
}

/// Measure a single line of text: `(width, height)` in pixels.
///
/// Height spans ascent to descent so descenders are not clipped; width is
/// the sum of advances with kerning applied.
pub fn measure_text(font: &FontVec, size: f32, text: &str) -> (u32, u32) {
    let scaled = font.as_scaled(PxScale::from(size));
    let height = (scaled.ascent() - scaled.descent()).ceil() as u32;

    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev_id) = prev {
            width += scaled.kern(prev_id, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    (width.ceil() as u32, height)
}

/// Vertical offset from the glyph origin to the top of the line box.
pub fn ascent(font: &FontVec, size: f32) -> f32 {
    font.as_scaled(PxScale::from(size)).ascent()
}
