//! Badge styling types: colors, anchors, size policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use aph_core::{Error, Result};

// ---------------------------------------------------------------------------
// Rgba
// ---------------------------------------------------------------------------

/// RGBA color, parsed from `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba(0, 0, 0, 255);

    /// Apply an opacity multiplier to the alpha channel.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.3) * opacity.clamp(0.0, 1.0)).round() as u8;
        Rgba(self.0, self.1, self.2, a)
    }

    pub fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba([self.0, self.1, self.2, self.3])
    }
}

impl FromStr for Rgba {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim_start_matches('#');
        let parse = |range: std::ops::Range<usize>| -> Result<u8> {
            u8::from_str_radix(hex.get(range).unwrap_or(""), 16)
                .map_err(|_| Error::ConfigInvalid(format!("bad color '{s}'")))
        };
        match hex.len() {
            6 => Ok(Rgba(parse(0..2)?, parse(2..4)?, parse(4..6)?, 255)),
            8 => Ok(Rgba(parse(0..2)?, parse(2..4)?, parse(4..6)?, parse(6..8)?)),
            _ => Err(Error::ConfigInvalid(format!("bad color '{s}'"))),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.3 == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.0, self.1, self.2, self.3)
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Anchor
// ---------------------------------------------------------------------------

/// Poster corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Placement anchor: a corner plus an optional flush variant that drops the
/// edge padding (used by awards ribbons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub corner: Corner,
    pub flush: bool,
}

impl Anchor {
    pub const fn new(corner: Corner) -> Self {
        Self {
            corner,
            flush: false,
        }
    }

    pub const fn flush(corner: Corner) -> Self {
        Self {
            corner,
            flush: true,
        }
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (base, flush) = match s.strip_suffix("-flush") {
            Some(base) => (base, true),
            None => (s, false),
        };
        let corner = match base {
            "top-left" => Corner::TopLeft,
            "top-right" => Corner::TopRight,
            "bottom-left" => Corner::BottomLeft,
            "bottom-right" => Corner::BottomRight,
            _ => return Err(Error::ConfigInvalid(format!("bad anchor '{s}'"))),
        };
        Ok(Anchor { corner, flush })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.corner {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        };
        if self.flush {
            write!(f, "{base}-flush")
        } else {
            f.write_str(base)
        }
    }
}

impl Serialize for Anchor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Anchor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SizePolicy / BadgeStyle
// ---------------------------------------------------------------------------

/// How a badge background relates to its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePolicy {
    /// Background expands to fit the measured content.
    #[default]
    Dynamic,
    /// Content is scaled to a fixed badge edge.
    Fixed,
}

/// Style block for one badge type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeStyle {
    /// Font file name looked up in the font search path.
    pub font: String,
    pub font_size: f32,
    pub fg: Rgba,
    pub bg: Rgba,
    /// Background opacity multiplier, 0.0–1.0.
    pub opacity: f32,
    /// Border width in pixels; 0 disables the border.
    pub border_width: u32,
    pub border_color: Rgba,
    /// Whether to render a drop shadow under the badge.
    pub shadow: bool,
    /// Inner padding between content and background edge.
    pub padding: u32,
    /// Corner radius of the rounded background.
    pub corner_radius: u32,
    pub size_policy: SizePolicy,
    /// Fixed edge length used when `size_policy` is `Fixed`.
    pub fixed_edge: u32,
}

impl Default for BadgeStyle {
    fn default() -> Self {
        Self {
            font: "DejaVuSans.ttf".into(),
            font_size: 42.0,
            fg: Rgba::WHITE,
            bg: Rgba(0, 0, 0, 255),
            opacity: 0.75,
            border_width: 0,
            border_color: Rgba::BLACK,
            shadow: false,
            padding: 16,
            corner_radius: 10,
            size_policy: SizePolicy::Dynamic,
            fixed_edge: 100,
        }
    }
}
