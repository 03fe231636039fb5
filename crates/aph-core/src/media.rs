//! Media-domain enums: item kinds, resolution classes, dynamic range, audio
//! codecs, badge types, review and award sources.
//!
//! All enums serialize in lowercase/snake_case and implement `Display`
//! manually for consistent string representation in logs, settings, and the
//! database.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Kind of catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Series,
    Episode,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
            Self::Episode => write!(f, "episode"),
        }
    }
}

/// Reference to a catalog item: opaque ID plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_id: crate::ids::ItemId,
    pub kind: ItemKind,
}

impl ItemRef {
    pub fn new(item_id: impl Into<crate::ids::ItemId>, kind: ItemKind) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// ResolutionClass
// ---------------------------------------------------------------------------

/// Width-primary resolution classification.
///
/// Ordered from lowest to highest so that "choose the higher class" is plain
/// `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionClass {
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "576p")]
    R576p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "4k")]
    R4k,
}

impl ResolutionClass {
    /// Parse a filename/settings token like `2160p`, `4k`, or `uhd`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "2160p" | "4k" | "uhd" => Some(Self::R4k),
            "1080p" => Some(Self::R1080p),
            "720p" => Some(Self::R720p),
            "576p" => Some(Self::R576p),
            "480p" => Some(Self::R480p),
            _ => None,
        }
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R480p => write!(f, "480p"),
            Self::R576p => write!(f, "576p"),
            Self::R720p => write!(f, "720p"),
            Self::R1080p => write!(f, "1080p"),
            Self::R4k => write!(f, "4k"),
        }
    }
}

// ---------------------------------------------------------------------------
// DynamicRange
// ---------------------------------------------------------------------------

/// Dynamic-range classification combining HDR and Dolby Vision flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRange {
    Sdr,
    Hdr,
    HdrPlus,
    Dv,
    DvHdr,
    DvHdrPlus,
}

impl DynamicRange {
    /// Combine independent flags into a single classification.
    pub fn from_flags(dv: bool, hdr: bool, hdr_plus: bool) -> Self {
        match (dv, hdr || hdr_plus, hdr_plus) {
            (true, true, true) => Self::DvHdrPlus,
            (true, true, false) => Self::DvHdr,
            (true, false, _) => Self::Dv,
            (false, true, true) => Self::HdrPlus,
            (false, true, false) => Self::Hdr,
            (false, false, _) => Self::Sdr,
        }
    }

    /// Whether any form of HDR is present (HDR10, HDR10+, or DV-with-HDR).
    pub fn is_hdr(&self) -> bool {
        !matches!(self, Self::Sdr | Self::Dv)
    }

    /// Whether Dolby Vision is present.
    pub fn is_dv(&self) -> bool {
        matches!(self, Self::Dv | Self::DvHdr | Self::DvHdrPlus)
    }

    /// Decompose back into (dv, hdr, hdr_plus) flags for OR-combining.
    pub fn flags(&self) -> (bool, bool, bool) {
        match self {
            Self::Sdr => (false, false, false),
            Self::Hdr => (false, true, false),
            Self::HdrPlus => (false, true, true),
            Self::Dv => (true, false, false),
            Self::DvHdr => (true, true, false),
            Self::DvHdrPlus => (true, true, true),
        }
    }

    /// OR-combine two classifications (used by the series election).
    pub fn union(self, other: Self) -> Self {
        let (dv_a, hdr_a, plus_a) = self.flags();
        let (dv_b, hdr_b, plus_b) = other.flags();
        Self::from_flags(dv_a || dv_b, hdr_a || hdr_b, plus_a || plus_b)
    }
}

impl fmt::Display for DynamicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sdr => write!(f, "sdr"),
            Self::Hdr => write!(f, "hdr"),
            Self::HdrPlus => write!(f, "hdr_plus"),
            Self::Dv => write!(f, "dv"),
            Self::DvHdr => write!(f, "dv_hdr"),
            Self::DvHdrPlus => write!(f, "dv_hdr_plus"),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioCodec
// ---------------------------------------------------------------------------

/// Normalized audio codec symbols, ordered roughly by richness.
///
/// The ordering is used as the tie-break in the series dominant election:
/// between equally frequent codecs, the richer one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Mp3,
    Aac,
    Pcm,
    Flac,
    Opus,
    Ac3,
    Eac3,
    Dts,
    DtsHdMa,
    TrueHd,
    DtsX,
    Atmos,
}

impl AudioCodec {
    /// Normalize a codec token from catalog stream metadata.
    ///
    /// `title_hint` carries the stream title/profile string, which is where
    /// Atmos and DTS:X extension flags usually live.
    pub fn from_stream(codec: &str, title_hint: Option<&str>) -> Option<Self> {
        let codec = codec.to_ascii_lowercase();
        let hint = title_hint.map(str::to_ascii_lowercase).unwrap_or_default();

        // Extension flags take precedence over the base codec token.
        if hint.contains("atmos") {
            return Some(Self::Atmos);
        }
        if hint.contains("dts:x") || hint.contains("dts-x") || hint.contains("dts x") {
            return Some(Self::DtsX);
        }

        match codec.as_str() {
            "truehd" | "mlp" => Some(Self::TrueHd),
            "eac3" | "e-ac-3" | "ddp" | "dd+" => Some(Self::Eac3),
            "ac3" | "ac-3" | "dd" => Some(Self::Ac3),
            "dts" => {
                if hint.contains("ma") || hint.contains("master audio") {
                    Some(Self::DtsHdMa)
                } else {
                    Some(Self::Dts)
                }
            }
            "dts-hd" | "dtshd" | "dts_hd" => Some(Self::DtsHdMa),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            "opus" => Some(Self::Opus),
            "mp3" => Some(Self::Mp3),
            s if s.starts_with("pcm") => Some(Self::Pcm),
            _ => None,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp3 => write!(f, "mp3"),
            Self::Aac => write!(f, "aac"),
            Self::Pcm => write!(f, "pcm"),
            Self::Flac => write!(f, "flac"),
            Self::Opus => write!(f, "opus"),
            Self::Ac3 => write!(f, "ac3"),
            Self::Eac3 => write!(f, "eac3"),
            Self::Dts => write!(f, "dts"),
            Self::DtsHdMa => write!(f, "dtshdma"),
            Self::TrueHd => write!(f, "truehd"),
            Self::DtsX => write!(f, "dts_x"),
            Self::Atmos => write!(f, "atmos"),
        }
    }
}

// ---------------------------------------------------------------------------
// BadgeType
// ---------------------------------------------------------------------------

/// The four badge families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeType {
    Audio,
    Resolution,
    Review,
    Awards,
}

impl BadgeType {
    /// All badge types, in rendering order.
    pub const ALL: [BadgeType; 4] = [
        BadgeType::Audio,
        BadgeType::Resolution,
        BadgeType::Review,
        BadgeType::Awards,
    ];
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Resolution => write!(f, "resolution"),
            Self::Review => write!(f, "review"),
            Self::Awards => write!(f, "awards"),
        }
    }
}

// ---------------------------------------------------------------------------
// ReviewSource / ScoreScale
// ---------------------------------------------------------------------------

/// Scale a review score is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    ZeroToTen,
    ZeroToHundred,
}

/// Review rating sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    Imdb,
    RottenTomatoes,
    Metacritic,
    Tmdb,
    Anidb,
    Mal,
    Mdblist,
}

impl ReviewSource {
    /// The scale this source's normalized scores use.
    pub fn scale(&self) -> ScoreScale {
        match self {
            Self::Imdb | Self::Anidb | Self::Mal | Self::Tmdb => ScoreScale::ZeroToTen,
            Self::RottenTomatoes | Self::Metacritic | Self::Mdblist => ScoreScale::ZeroToHundred,
        }
    }
}

impl fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imdb => write!(f, "imdb"),
            Self::RottenTomatoes => write!(f, "rotten_tomatoes"),
            Self::Metacritic => write!(f, "metacritic"),
            Self::Tmdb => write!(f, "tmdb"),
            Self::Anidb => write!(f, "anidb"),
            Self::Mal => write!(f, "mal"),
            Self::Mdblist => write!(f, "mdblist"),
        }
    }
}

// ---------------------------------------------------------------------------
// AwardSource
// ---------------------------------------------------------------------------

/// Award detection sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardSource {
    Oscars,
    Emmys,
    GoldenGlobes,
    Bafta,
    Cannes,
    Crunchyroll,
}

impl fmt::Display for AwardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oscars => write!(f, "oscars"),
            Self::Emmys => write!(f, "emmys"),
            Self::GoldenGlobes => write!(f, "golden_globes"),
            Self::Bafta => write!(f, "bafta"),
            Self::Cannes => write!(f, "cannes"),
            Self::Crunchyroll => write!(f, "crunchyroll"),
        }
    }
}
