//! Resolved item attributes and their provenance.
//!
//! [`ItemAttributes`] is the immutable output of one resolution pass: the
//! single elected value per attribute, plus a [`Provenance`] record of which
//! source produced what (for diagnostics and per-item results).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::media::{AudioCodec, AwardSource, DynamicRange, ResolutionClass, ReviewSource, ScoreScale};

/// One normalized review rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Which source produced the rating.
    pub source: ReviewSource,
    /// Normalized score on the source's scale.
    pub score: f32,
    /// The scale `score` is expressed in.
    pub scale: ScoreScale,
    /// The raw value as returned by the source (e.g. `"95%"`, `"8.0/10"`).
    pub raw: String,
}

impl Review {
    pub fn new(source: ReviewSource, score: f32, raw: impl Into<String>) -> Self {
        Self {
            source,
            score,
            scale: source.scale(),
            raw: raw.into(),
        }
    }
}

/// Per-field record of which source produced each value.
///
/// Keys are free-form field names (`"resolution"`, `"audio"`, …); values are
/// ordered notes such as `"stream:3840x2160"` or `"filename:2160p"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    entries: BTreeMap<String, Vec<String>>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note for a field.
    pub fn record(&mut self, field: impl Into<String>, note: impl Into<String>) {
        self.entries.entry(field.into()).or_default().push(note.into());
    }

    /// All notes recorded for a field, oldest first.
    pub fn notes(&self, field: &str) -> &[String] {
        self.entries.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any note for `field` contains `needle`.
    pub fn contains(&self, field: &str, needle: &str) -> bool {
        self.notes(field).iter().any(|n| n.contains(needle))
    }

    /// Merge another provenance record into this one.
    pub fn merge(&mut self, other: Provenance) {
        for (field, notes) in other.entries {
            self.entries.entry(field).or_default().extend(notes);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derived attributes for one item, immutable per resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    /// Width-primary resolution class.
    pub resolution_class: ResolutionClass,
    /// HDR/DV classification. May be non-SDR even at sub-4K resolutions.
    pub dynamic_range: DynamicRange,
    /// Normalized primary audio codec, if one could be determined.
    pub primary_audio_codec: Option<AudioCodec>,
    /// Reviews in configured priority order; sources are distinct.
    pub reviews: Vec<Review>,
    /// Award sources detected for the item.
    pub awards: BTreeSet<AwardSource>,
    /// Which source produced each field.
    pub provenance: Provenance,
}

impl ItemAttributes {
    /// A minimal attribute set (SDR 480p, nothing else known).
    pub fn unknown() -> Self {
        Self {
            resolution_class: ResolutionClass::R480p,
            dynamic_range: DynamicRange::Sdr,
            primary_audio_codec: None,
            reviews: Vec::new(),
            awards: BTreeSet::new(),
            provenance: Provenance::new(),
        }
    }
}
