//! Local awards dataset.
//!
//! Award wins are matched from a static JSON dataset shipped with the
//! application (the Crunchyroll Anime Awards dataset, optionally extended
//! with other ceremonies). Matching prefers the TMDb ID and falls back to
//! title variants. No network I/O is involved.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use aph_core::{AwardSource, Error, Result};

use crate::source::{EnrichmentSource, LookupHints, SourceResult};
use crate::title::{clean_title, title_variants};

/// One dataset row.
#[derive(Debug, Clone, Deserialize)]
pub struct AwardEntry {
    pub award: AwardSource,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
}

/// In-memory award index.
#[derive(Debug, Default)]
pub struct AwardsDataset {
    by_tmdb: HashMap<u64, Vec<AwardSource>>,
    by_title: HashMap<String, Vec<(Option<u32>, AwardSource)>>,
}

impl AwardsDataset {
    /// Load the dataset from a JSON array file. A missing file yields an
    /// empty dataset.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "awards dataset missing; awards disabled");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::from(e)),
        };
        let entries: Vec<AwardEntry> = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigInvalid(format!("bad awards dataset: {e}")))?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<AwardEntry>) -> Self {
        let mut dataset = Self::default();
        for entry in entries {
            if let Some(tmdb) = entry.tmdb_id {
                dataset.by_tmdb.entry(tmdb).or_default().push(entry.award);
            }
            dataset
                .by_title
                .entry(clean_title(&entry.title).to_lowercase())
                .or_default()
                .push((entry.year, entry.award));
        }
        dataset
    }

    pub fn is_empty(&self) -> bool {
        self.by_tmdb.is_empty() && self.by_title.is_empty()
    }

    /// Match by TMDb ID first, then title variants (year-checked when both
    /// sides carry one).
    pub fn lookup(&self, hints: &LookupHints) -> Vec<AwardSource> {
        if let Some(awards) = hints
            .provider("tmdb")
            .and_then(|s| s.parse::<u64>().ok())
            .and_then(|id| self.by_tmdb.get(&id))
        {
            return awards.clone();
        }

        let Some(title) = hints.title.as_deref() else {
            return Vec::new();
        };
        for variant in title_variants(title) {
            if let Some(matches) = self.by_title.get(&variant.to_lowercase()) {
                return matches
                    .iter()
                    .filter(|(year, _)| match (year, hints.year) {
                        (Some(y), Some(h)) => *y == h,
                        _ => true,
                    })
                    .map(|(_, award)| *award)
                    .collect();
            }
        }
        Vec::new()
    }
}

#[async_trait]
impl EnrichmentSource for AwardsDataset {
    fn name(&self) -> &'static str {
        "crunchyroll"
    }

    fn cache_key(&self, _hints: &LookupHints) -> Option<String> {
        // Local lookups are cheaper than the cache round-trip.
        None
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        let awards = self.lookup(hints);
        if awards.is_empty() {
            return Err(Error::SourceNotFound {
                source_name: "crunchyroll".into(),
            });
        }
        Ok(SourceResult {
            awards: awards.into_iter().collect(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> AwardsDataset {
        AwardsDataset::from_entries(vec![
            AwardEntry {
                award: AwardSource::Crunchyroll,
                tmdb_id: Some(95479),
                title: "Jujutsu Kaisen".into(),
                year: Some(2021),
            },
            AwardEntry {
                award: AwardSource::Oscars,
                tmdb_id: None,
                title: "Spirited Away (2001)".into(),
                year: Some(2001),
            },
            AwardEntry {
                award: AwardSource::Crunchyroll,
                tmdb_id: None,
                title: "Demon Slayer: Kimetsu no Yaiba".into(),
                year: None,
            },
        ])
    }

    #[test]
    fn tmdb_id_match_wins() {
        let mut hints = LookupHints::default();
        hints.provider_ids.insert("tmdb".into(), "95479".into());
        hints.title = Some("Completely Different Title".into());

        assert_eq!(dataset().lookup(&hints), vec![AwardSource::Crunchyroll]);
    }

    #[test]
    fn title_variant_match() {
        let hints = LookupHints {
            title: Some("Demon Slayer: Kimetsu no Yaiba Season 2".into()),
            ..Default::default()
        };
        assert_eq!(dataset().lookup(&hints), vec![AwardSource::Crunchyroll]);
    }

    #[test]
    fn year_mismatch_filters() {
        let hints = LookupHints {
            title: Some("Spirited Away".into()),
            year: Some(1999),
            ..Default::default()
        };
        assert!(dataset().lookup(&hints).is_empty());

        let hints = LookupHints {
            title: Some("Spirited Away".into()),
            year: Some(2001),
            ..Default::default()
        };
        assert_eq!(dataset().lookup(&hints), vec![AwardSource::Oscars]);
    }

    #[test]
    fn no_match_is_empty() {
        let hints = LookupHints {
            title: Some("Unknown Show".into()),
            ..Default::default()
        };
        assert!(dataset().lookup(&hints).is_empty());
    }

    #[tokio::test]
    async fn fetch_maps_empty_to_not_found() {
        let hints = LookupHints {
            title: Some("Unknown Show".into()),
            ..Default::default()
        };
        let err = dataset().fetch(&hints).await.unwrap_err();
        assert_eq!(err.kind(), aph_core::ErrorKind::SourceNotFound);
    }

    #[test]
    fn missing_file_loads_empty() {
        let d = AwardsDataset::load(Path::new("/nonexistent/awards.json")).unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("awards.json");
        std::fs::write(
            &path,
            r#"[{"award": "crunchyroll", "tmdb_id": 1, "title": "X"}]"#,
        )
        .unwrap();
        let d = AwardsDataset::load(&path).unwrap();
        assert!(!d.is_empty());
    }
}
