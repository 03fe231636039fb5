//! Declarative badge selection rules.
//!
//! Rules are loaded per badge type from the settings store: an anchor, a
//! style block, a symbol→asset mapping, and a fallback-to-text switch.
//! Selection is deterministic: identical attributes and rules always yield
//! the same ordered badge list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use aph_core::{
    BadgeMask, BadgeType, DynamicRange, ItemAttributes, ResolutionClass, ScoreScale,
};

use crate::style::{Anchor, BadgeStyle, Corner};

// ---------------------------------------------------------------------------
// Visuals and instances
// ---------------------------------------------------------------------------

/// What a badge shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BadgeVisual {
    /// Text only.
    Text(String),
    /// An image asset, with optional text used when the asset is missing.
    Asset {
        name: String,
        fallback_text: Option<String>,
    },
    /// A small glyph asset beside text (review badges).
    Glyph { asset: String, text: String },
}

/// One badge ready for the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeInstance {
    pub badge_type: BadgeType,
    pub visual: BadgeVisual,
    pub anchor: Anchor,
    pub style: BadgeStyle,
}

/// Selection outcome: ordered instances plus skip notes for provenance.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub instances: Vec<BadgeInstance>,
    /// `(badge type, reason)` for badges that could not be selected.
    pub skipped: Vec<(BadgeType, String)>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Rules for one badge type.
#[derive(Debug, Clone)]
pub struct BadgeRules {
    pub anchor: Anchor,
    pub style: BadgeStyle,
    /// Normalized symbol → asset file name.
    pub mappings: BTreeMap<String, String>,
    /// Render the symbol as text when no asset is mapped or present.
    pub fallback_to_text: bool,
}

impl BadgeRules {
    fn with_anchor(anchor: Anchor) -> Self {
        Self {
            anchor,
            style: BadgeStyle::default(),
            mappings: BTreeMap::new(),
            fallback_to_text: true,
        }
    }

    /// Overlay stored settings (`anchor`, `style`, `mappings`,
    /// `fallback_to_text`) onto the defaults.
    fn apply_settings(&mut self, settings: &BTreeMap<String, String>) {
        if let Some(anchor) = settings.get("anchor").and_then(|s| s.parse().ok()) {
            self.anchor = anchor;
        }
        if let Some(style) = settings
            .get("style")
            .and_then(|s| serde_json::from_str(s).ok())
        {
            self.style = style;
        }
        if let Some(mappings) = settings
            .get("mappings")
            .and_then(|s| serde_json::from_str(s).ok())
        {
            self.mappings = mappings;
        }
        if let Some(flag) = settings.get("fallback_to_text") {
            self.fallback_to_text = flag == "true" || flag == "1";
        }
    }
}

/// Build the combined resolution symbol (e.g. `4khdr`, `1080pdvhdr`).
fn resolution_symbol(class: ResolutionClass, range: DynamicRange) -> String {
    let suffix = match range {
        DynamicRange::Sdr => "",
        DynamicRange::Hdr => "hdr",
        DynamicRange::HdrPlus => "hdrplus",
        DynamicRange::Dv => "dv",
        DynamicRange::DvHdr => "dvhdr",
        DynamicRange::DvHdrPlus => "dvhdrplus",
    };
    format!("{class}{suffix}")
}

/// Format a review score for its scale.
fn format_score(score: f32, scale: ScoreScale) -> String {
    match scale {
        ScoreScale::ZeroToTen => format!("{score:.1}"),
        ScoreScale::ZeroToHundred => format!("{score:.0}%"),
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full rule set, one [`BadgeRules`] per badge type.
#[derive(Debug, Clone)]
pub struct BadgeCatalog {
    audio: BadgeRules,
    resolution: BadgeRules,
    review: BadgeRules,
    awards: BadgeRules,
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self {
            audio: BadgeRules::with_anchor(Anchor::new(Corner::TopRight)),
            resolution: BadgeRules::with_anchor(Anchor::new(Corner::TopLeft)),
            review: BadgeRules::with_anchor(Anchor::new(Corner::BottomLeft)),
            awards: BadgeRules {
                fallback_to_text: false,
                ..BadgeRules::with_anchor(Anchor::flush(Corner::BottomRight))
            },
        }
    }
}

impl BadgeCatalog {
    /// Build a catalog from per-type settings maps (the `badge_settings`
    /// table), overlaying defaults.
    pub fn from_settings(
        per_type: impl Fn(BadgeType) -> BTreeMap<String, String>,
    ) -> Self {
        let mut catalog = Self::default();
        catalog.audio.apply_settings(&per_type(BadgeType::Audio));
        catalog
            .resolution
            .apply_settings(&per_type(BadgeType::Resolution));
        catalog.review.apply_settings(&per_type(BadgeType::Review));
        catalog.awards.apply_settings(&per_type(BadgeType::Awards));
        catalog
    }

    pub fn rules(&self, badge_type: BadgeType) -> &BadgeRules {
        match badge_type {
            BadgeType::Audio => &self.audio,
            BadgeType::Resolution => &self.resolution,
            BadgeType::Review => &self.review,
            BadgeType::Awards => &self.awards,
        }
    }

    /// Select badges for resolved attributes, intersected with the mask.
    pub fn select(&self, attrs: &ItemAttributes, mask: &BadgeMask) -> Selection {
        let mut selection = Selection::default();

        if mask.contains(BadgeType::Audio) {
            match attrs.primary_audio_codec {
                Some(codec) => self.push_symbol_badge(
                    &mut selection,
                    BadgeType::Audio,
                    &codec.to_string(),
                ),
                None => selection
                    .skipped
                    .push((BadgeType::Audio, "unknown_symbol".into())),
            }
        }

        if mask.contains(BadgeType::Resolution) {
            let symbol = resolution_symbol(attrs.resolution_class, attrs.dynamic_range);
            self.push_symbol_badge(&mut selection, BadgeType::Resolution, &symbol);
        }

        if mask.contains(BadgeType::Review) {
            for review in &attrs.reviews {
                let asset = self
                    .review
                    .mappings
                    .get(&review.source.to_string())
                    .cloned()
                    .unwrap_or_else(|| format!("{}.png", review.source));
                selection.instances.push(BadgeInstance {
                    badge_type: BadgeType::Review,
                    visual: BadgeVisual::Glyph {
                        asset,
                        text: format_score(review.score, review.scale),
                    },
                    anchor: self.review.anchor,
                    style: self.review.style.clone(),
                });
            }
        }

        if mask.contains(BadgeType::Awards) {
            for award in &attrs.awards {
                let name = award.to_string();
                let asset = self.awards.mappings.get(&name).cloned();
                match (asset, self.awards.fallback_to_text) {
                    (Some(asset), fallback) => selection.instances.push(BadgeInstance {
                        badge_type: BadgeType::Awards,
                        visual: BadgeVisual::Asset {
                            name: asset,
                            fallback_text: fallback.then(|| name.clone()),
                        },
                        anchor: self.awards.anchor,
                        style: self.awards.style.clone(),
                    }),
                    (None, _) => selection.instances.push(BadgeInstance {
                        badge_type: BadgeType::Awards,
                        visual: BadgeVisual::Asset {
                            name: format!("{name}.png"),
                            fallback_text: self.awards.fallback_to_text.then(|| name.clone()),
                        },
                        anchor: self.awards.anchor,
                        style: self.awards.style.clone(),
                    }),
                }
            }
        }

        selection
    }

    /// Push a mapped-symbol badge (audio/resolution family).
    fn push_symbol_badge(&self, selection: &mut Selection, badge_type: BadgeType, symbol: &str) {
        let rules = self.rules(badge_type);

        // Combined symbol first, then the bare class for resolution.
        let mapped = rules.mappings.get(symbol).cloned().or_else(|| {
            if badge_type == BadgeType::Resolution {
                let base: String = symbol
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == 'k' || *c == 'p')
                    .collect();
                rules.mappings.get(&base).cloned()
            } else {
                None
            }
        });

        match mapped {
            Some(asset) => selection.instances.push(BadgeInstance {
                badge_type,
                visual: BadgeVisual::Asset {
                    name: asset,
                    fallback_text: rules.fallback_to_text.then(|| symbol.to_string()),
                },
                anchor: rules.anchor,
                style: rules.style.clone(),
            }),
            None if rules.fallback_to_text => selection.instances.push(BadgeInstance {
                badge_type,
                visual: BadgeVisual::Text(symbol.to_string()),
                anchor: rules.anchor,
                style: rules.style.clone(),
            }),
            None => selection
                .skipped
                .push((badge_type, format!("no-mapping:{symbol}"))),
        }
    }
}
