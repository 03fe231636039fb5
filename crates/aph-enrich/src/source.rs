//! The enrichment source seam.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aph_core::{AwardSource, ItemKind, Result, Review};

/// What a source learned about an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceResult {
    /// Ratings produced by this source.
    pub reviews: Vec<Review>,
    /// Awards detected by this source.
    pub awards: BTreeSet<AwardSource>,
    /// External IDs discovered along the way (e.g. a title search that
    /// resolved an AniDB ID). Keyed by provider name.
    pub discovered_ids: BTreeMap<String, String>,
}

impl SourceResult {
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty() && self.awards.is_empty()
    }
}

/// Everything a source may use to identify an item.
///
/// Built once per item by the resolver from catalog metadata plus IDs
/// discovered by earlier sources.
#[derive(Debug, Clone, Default)]
pub struct LookupHints {
    pub title: Option<String>,
    pub year: Option<u32>,
    pub kind: Option<ItemKind>,
    /// Provider IDs, catalog-supplied and discovered. Keys are provider
    /// names in lowercase (`imdb`, `tmdb`, `anidb`, `anilist`, `mal`).
    pub provider_ids: BTreeMap<String, String>,
    /// Whether the item classifies as anime (genre or provider ID match).
    pub is_anime: bool,
}

impl LookupHints {
    pub fn provider(&self, name: &str) -> Option<&str> {
        self.provider_ids.get(name).map(String::as_str)
    }

    /// Record a discovered ID for downstream sources.
    pub fn absorb(&mut self, discovered: &BTreeMap<String, String>) {
        for (k, v) in discovered {
            self.provider_ids
                .entry(k.to_ascii_lowercase())
                .or_insert_with(|| v.clone());
        }
    }
}

/// A single external rating/awards source.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Stable source name, matching the `review_sources` table.
    fn name(&self) -> &'static str;

    /// The logical cache key for a lookup, or `None` when the source cannot
    /// query this item at all (missing ID and no usable title).
    fn cache_key(&self, hints: &LookupHints) -> Option<String>;

    /// Perform the lookup. `source_not_found` means the source answered but
    /// knows nothing about the item.
    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult>;
}

/// Priority-ordered set of sources.
pub struct SourceRegistry {
    sources: Vec<(i64, Arc<dyn EnrichmentSource>)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source at a priority (lower runs first).
    pub fn register(&mut self, priority: i64, source: Arc<dyn EnrichmentSource>) {
        self.sources.push((priority, source));
        self.sources.sort_by_key(|(p, _)| *p);
    }

    /// Sources in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EnrichmentSource>> {
        self.sources.iter().map(|(_, s)| s)
    }

    /// Look up one source by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn EnrichmentSource>> {
        self.sources
            .iter()
            .find(|(_, s)| s.name() == name)
            .map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
