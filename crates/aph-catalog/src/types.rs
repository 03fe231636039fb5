//! Response types for the catalog API.
//!
//! The catalog sends many more fields than we consume; every struct here
//! must tolerate unknown fields and absent values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use aph_core::{ItemId, ItemKind};

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// One library view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CollectionType")]
    pub collection_type: Option<String>,
}

/// Wrapper for `/Users/{user}/Views`.
#[derive(Debug, Deserialize)]
pub(crate) struct ViewsResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<Library>,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// External provider IDs (`ProviderIds` in the catalog JSON).
///
/// Keys are provider names as the catalog spells them (`Imdb`, `Tmdb`,
/// `AniDB`, ...); lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderIds(pub BTreeMap<String, String>);

impl ProviderIds {
    /// Case-insensitive provider lookup.
    pub fn get(&self, provider: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(provider))
            .map(|(_, v)| v.as_str())
    }
}

/// Stream classification within an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[serde(other)]
    Other,
}

/// One media stream as reported by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaStream {
    #[serde(rename = "Type")]
    pub kind: Option<StreamKind>,
    #[serde(rename = "Codec")]
    pub codec: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Profile")]
    pub profile: Option<String>,
    #[serde(rename = "Width")]
    pub width: Option<u32>,
    #[serde(rename = "Height")]
    pub height: Option<u32>,
    #[serde(rename = "Channels")]
    pub channels: Option<u32>,
    #[serde(rename = "IsDefault")]
    pub is_default: bool,
    #[serde(rename = "VideoRange")]
    pub video_range: Option<String>,
    #[serde(rename = "VideoRangeType")]
    pub video_range_type: Option<String>,
}

impl MediaStream {
    pub fn is_video(&self) -> bool {
        matches!(self.kind, Some(StreamKind::Video))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, Some(StreamKind::Audio))
    }
}

/// Item metadata as consumed by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub item_type: Option<String>,
    #[serde(rename = "ProductionYear")]
    pub production_year: Option<u32>,
    #[serde(rename = "Genres")]
    pub genres: Vec<String>,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "ProviderIds")]
    pub provider_ids: ProviderIds,
    #[serde(rename = "MediaStreams")]
    pub media_streams: Vec<MediaStream>,
    #[serde(rename = "Path")]
    pub path: Option<String>,
    #[serde(rename = "SeriesId")]
    pub series_id: Option<String>,
    #[serde(rename = "ParentIndexNumber")]
    pub season_number: Option<u32>,
    #[serde(rename = "IndexNumber")]
    pub episode_number: Option<u32>,
}

impl CatalogItem {
    /// The item's typed ID.
    pub fn item_id(&self) -> ItemId {
        ItemId::new(self.id.clone())
    }

    /// Map the catalog's `Type` field onto [`ItemKind`], when recognized.
    pub fn kind(&self) -> Option<ItemKind> {
        match self.item_type.as_deref() {
            Some("Movie") => Some(ItemKind::Movie),
            Some("Series") => Some(ItemKind::Series),
            Some("Episode") => Some(ItemKind::Episode),
            _ => None,
        }
    }

    /// Whether the item carries the given tag (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether any genre marks the item as anime.
    pub fn is_anime(&self) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case("anime"))
            || self.provider_ids.get("AniDB").is_some()
            || self.provider_ids.get("AniList").is_some()
    }
}

/// One page of an item enumeration, restartable via `start_index`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPage {
    #[serde(rename = "Items", default)]
    pub items: Vec<CatalogItem>,
    #[serde(rename = "StartIndex", default)]
    pub start_index: u32,
    #[serde(rename = "TotalRecordCount", default)]
    pub total_count: u32,
}

impl ItemPage {
    /// Cursor for the next page, or `None` when exhausted.
    pub fn next_cursor(&self) -> Option<u32> {
        let next = self.start_index + self.items.len() as u32;
        (next < self.total_count && !self.items.is_empty()).then_some(next)
    }
}

/// Downloaded image bytes with their content type.
#[derive(Debug, Clone)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub mime: String,
}
