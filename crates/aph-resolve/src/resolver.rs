//! The attribute resolver: one pass from catalog metadata + enrichment to
//! an immutable [`ItemAttributes`] record.
//!
//! Enrichment sources are fetched concurrently and never fail the pass:
//! every source failure degrades to a provenance note. A second concurrent
//! round runs for sources that reported not-found before IDs discovered by
//! their peers (TMDb finding the IMDb ID, AniDB finding its own) became
//! available.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use aph_catalog::{CatalogClient, CatalogItem};
use aph_core::config::{ConflictPolicy, SeriesConfig};
use aph_core::{
    AwardSource, Error, ItemAttributes, ItemKind, Provenance, Result, Review, ReviewSource,
};
use aph_enrich::{EnrichmentSource, LookupHints, SourceResult};

use crate::audio::detect_audio;
use crate::filename::scan_filename;
use crate::resolution::detect_resolution;
use crate::series::{elect_series, sample_indices, EpisodeSample};

/// Review-source badge priority, derived from the `review_sources` table.
#[derive(Debug, Clone)]
pub struct ReviewPriority {
    pub source: ReviewSource,
    pub priority: i64,
    pub anime_only: bool,
}

/// Resolver tuning, assembled from configuration at construction.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub conflict_policy: ConflictPolicy,
    pub series: SeriesConfig,
    pub max_review_badges: usize,
    pub multiple_awards: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Higher,
            series: SeriesConfig::default(),
            max_review_badges: 4,
            multiple_awards: false,
        }
    }
}

/// Resolves item attributes from catalog metadata and enrichment sources.
pub struct AttributeResolver {
    catalog: Arc<CatalogClient>,
    sources: Vec<Arc<dyn EnrichmentSource>>,
    priorities: Vec<ReviewPriority>,
    options: ResolverOptions,
}

impl AttributeResolver {
    /// `sources` must already be in registry priority order; `priorities`
    /// carries the per-badge review ordering and anime conditions.
    pub fn new(
        catalog: Arc<CatalogClient>,
        sources: Vec<Arc<dyn EnrichmentSource>>,
        priorities: Vec<ReviewPriority>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            catalog,
            sources,
            priorities,
            options,
        }
    }

    /// Resolve attributes for one item.
    pub async fn resolve(&self, item: &CatalogItem) -> Result<ItemAttributes> {
        let mut hints = build_hints(item);
        let mut attrs = ItemAttributes::unknown();

        // Technical attributes from streams + filename.
        match item.kind() {
            Some(ItemKind::Series) => self.resolve_series(item, &mut attrs).await?,
            _ => self.resolve_streams(item, &mut attrs),
        }

        // Enrichment: reviews and awards, best-effort.
        let results = self.fetch_all(&mut hints, &mut attrs.provenance).await;
        self.select_reviews(&results, hints.is_anime, &mut attrs);
        self.select_awards(&results, &mut attrs);

        Ok(attrs)
    }

    fn resolve_streams(&self, item: &CatalogItem, attrs: &mut ItemAttributes) {
        let signals = item
            .path
            .as_deref()
            .map(scan_filename)
            .unwrap_or_default();
        let detection =
            detect_resolution(&item.media_streams, signals, self.options.conflict_policy);
        attrs.resolution_class = detection.class;
        attrs.dynamic_range = detection.dynamic_range;
        attrs.provenance.merge(detection.provenance);

        let (codec, audio_prov) = detect_audio(&item.media_streams);
        attrs.primary_audio_codec = codec;
        attrs.provenance.merge(audio_prov);
    }

    /// Sample episodes under a time budget and elect dominant values.
    async fn resolve_series(&self, item: &CatalogItem, attrs: &mut ItemAttributes) -> Result<()> {
        let budget = Duration::from_secs(self.options.series.sample_budget_secs);
        let fetch = self.catalog.list_episodes(&item.id, 200);

        let episodes = match tokio::time::timeout(budget, fetch).await {
            Ok(Ok(episodes)) => episodes,
            Ok(Err(e)) => {
                tracing::warn!(series = %item.id, error = %e, "episode listing failed");
                attrs.provenance.record("series", format!("episodes:{}", e.kind()));
                Vec::new()
            }
            Err(_) => {
                attrs.provenance.record("series", "episodes:timeout");
                Vec::new()
            }
        };

        let indices = sample_indices(episodes.len(), self.options.series.sample_episodes);
        let samples: Vec<EpisodeSample> = indices
            .iter()
            .map(|&i| {
                let ep = &episodes[i];
                let signals = ep.path.as_deref().map(scan_filename).unwrap_or_default();
                let detection =
                    detect_resolution(&ep.media_streams, signals, self.options.conflict_policy);
                let (audio, _) = detect_audio(&ep.media_streams);
                EpisodeSample {
                    resolution: detection.class,
                    audio,
                    dynamic_range: detection.dynamic_range,
                }
            })
            .collect();

        match elect_series(&samples, self.options.series.hdr_any_episode) {
            Some(elected) => {
                attrs.resolution_class = elected.resolution;
                attrs.primary_audio_codec = elected.audio;
                attrs.dynamic_range = elected.dynamic_range;
                attrs
                    .provenance
                    .record("series", format!("elected-from:{}", elected.sampled));
            }
            None => {
                // No episode data at all; fall back to the series row itself.
                self.resolve_streams(item, attrs);
                attrs.provenance.record("series", "no-episodes:series-row");
            }
        }
        Ok(())
    }

    /// Fetch every source concurrently, then re-fetch not-found sources once
    /// if the first round discovered new provider IDs.
    async fn fetch_all(
        &self,
        hints: &mut LookupHints,
        provenance: &mut Provenance,
    ) -> Vec<(usize, SourceResult)> {
        let round1 = join_all(self.sources.iter().map(|s| s.fetch(hints))).await;

        let mut results: Vec<(usize, SourceResult)> = Vec::new();
        let mut retry: Vec<usize> = Vec::new();
        let mut discovered = BTreeMap::new();

        for (idx, outcome) in round1.into_iter().enumerate() {
            let name = self.sources[idx].name();
            match outcome {
                Ok(result) => {
                    discovered.extend(result.discovered_ids.clone());
                    provenance.record("enrichment", format!("{name}:ok"));
                    results.push((idx, result));
                }
                Err(Error::SourceNotFound { .. }) => {
                    retry.push(idx);
                }
                Err(e) => {
                    tracing::debug!(source = name, error = %e, "enrichment source failed");
                    provenance.record("enrichment", format!("{name}:{}", e.kind()));
                }
            }
        }

        if !discovered.is_empty() && !retry.is_empty() {
            let before: Vec<Option<String>> = retry
                .iter()
                .map(|&idx| self.sources[idx].cache_key(hints))
                .collect();
            hints.absorb(&discovered);

            // Only sources whose lookup actually changed go out again.
            let second: Vec<usize> = retry
                .iter()
                .zip(before)
                .filter(|(&idx, old_key)| self.sources[idx].cache_key(hints) != *old_key)
                .map(|(&idx, _)| idx)
                .collect();

            let round2 = join_all(second.iter().map(|&idx| self.sources[idx].fetch(hints))).await;
            for (&idx, outcome) in second.iter().zip(round2) {
                let name = self.sources[idx].name();
                match outcome {
                    Ok(result) => {
                        provenance.record("enrichment", format!("{name}:ok"));
                        results.push((idx, result));
                        retry.retain(|&r| r != idx);
                    }
                    Err(e) => {
                        provenance.record("enrichment", format!("{name}:{}", e.kind()));
                        retry.retain(|&r| r != idx);
                    }
                }
            }
        }

        for idx in retry {
            provenance.record(
                "enrichment",
                format!("{}:source_not_found", self.sources[idx].name()),
            );
        }

        results.sort_by_key(|(idx, _)| *idx);
        results
    }

    /// Filter, dedupe, order, and cap reviews per the configured priorities.
    fn select_reviews(
        &self,
        results: &[(usize, SourceResult)],
        is_anime: bool,
        attrs: &mut ItemAttributes,
    ) {
        let mut by_source: BTreeMap<ReviewSource, Review> = BTreeMap::new();
        for (_, result) in results {
            for review in &result.reviews {
                by_source.entry(review.source).or_insert_with(|| review.clone());
            }
        }

        let mut ordered: Vec<(i64, Review)> = Vec::new();
        for entry in &self.priorities {
            if entry.anime_only && !is_anime {
                continue;
            }
            if let Some(review) = by_source.remove(&entry.source) {
                ordered.push((entry.priority, review));
            }
        }
        ordered.sort_by_key(|(p, _)| *p);

        attrs.reviews = ordered
            .into_iter()
            .map(|(_, r)| r)
            .take(self.options.max_review_badges)
            .collect();
    }

    /// First non-empty awards hit in registry order wins, unless multiple
    /// awards are enabled (then the union is kept).
    fn select_awards(&self, results: &[(usize, SourceResult)], attrs: &mut ItemAttributes) {
        for (_, result) in results {
            if result.awards.is_empty() {
                continue;
            }
            if self.options.multiple_awards {
                attrs.awards.extend(result.awards.iter().copied());
            } else if attrs.awards.is_empty() {
                attrs.awards = result.awards.clone();
                attrs.provenance.record(
                    "awards",
                    format!(
                        "first-hit:{}",
                        result
                            .awards
                            .iter()
                            .map(AwardSource::to_string)
                            .collect::<Vec<_>>()
                            .join(",")
                    ),
                );
            }
        }
    }
}

/// Build lookup hints from catalog metadata.
fn build_hints(item: &CatalogItem) -> LookupHints {
    let mut provider_ids = BTreeMap::new();
    for (k, v) in &item.provider_ids.0 {
        provider_ids.insert(k.to_ascii_lowercase(), v.clone());
    }
    LookupHints {
        title: item.name.clone(),
        year: item.production_year,
        kind: item.kind(),
        is_anime: item.is_anime(),
        provider_ids,
    }
}
