//! MyAnimeList client.
//!
//! MAL IDs are resolved through an offline `AniDB→MAL` / `AniList→MAL`
//! mapping database first, then by title search. Lookups are gated on the
//! item classifying as anime.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aph_core::{Error, Result, Review, ReviewSource};

use crate::http::SourceHttp;
use crate::source::{EnrichmentSource, LookupHints, SourceResult};
use crate::title::{clean_title, title_variants};

const DEFAULT_BASE_URL: &str = "https://api.jikan.moe/v4";

// ---------------------------------------------------------------------------
// Offline mapping database
// ---------------------------------------------------------------------------

/// One row of the offline ID mapping dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingRow {
    #[serde(default)]
    pub anidb_id: Option<u64>,
    #[serde(default)]
    pub anilist_id: Option<u64>,
    pub mal_id: u64,
}

/// Offline `AniDB→MAL` and `AniList→MAL` mapping.
#[derive(Debug, Default)]
pub struct MalMapping {
    by_anidb: HashMap<u64, u64>,
    by_anilist: HashMap<u64, u64>,
}

impl MalMapping {
    /// Load the mapping from a JSON array file. A missing file yields an
    /// empty mapping (title search remains available).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "mal mapping file missing; using empty mapping");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::from(e)),
        };
        let rows: Vec<MappingRow> = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigInvalid(format!("bad mal mapping file: {e}")))?;
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<MappingRow>) -> Self {
        let mut mapping = Self::default();
        for row in rows {
            if let Some(anidb) = row.anidb_id {
                mapping.by_anidb.insert(anidb, row.mal_id);
            }
            if let Some(anilist) = row.anilist_id {
                mapping.by_anilist.insert(anilist, row.mal_id);
            }
        }
        mapping
    }

    pub fn from_anidb(&self, anidb_id: u64) -> Option<u64> {
        self.by_anidb.get(&anidb_id).copied()
    }

    pub fn from_anilist(&self, anilist_id: u64) -> Option<u64> {
        self.by_anilist.get(&anilist_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_anidb.len() + self.by_anilist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anidb.is_empty() && self.by_anilist.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct MalClient {
    http: SourceHttp,
    mapping: MalMapping,
    base_url: String,
}

impl MalClient {
    pub fn new(mapping: MalMapping, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new("mal", 3, call_timeout)?,
            mapping,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve a MAL ID: explicit provider ID, offline mapping, then title
    /// search.
    async fn resolve_id(&self, hints: &LookupHints) -> Result<Option<u64>> {
        if let Some(id) = hints.provider("mal").and_then(|s| s.parse().ok()) {
            return Ok(Some(id));
        }
        if let Some(id) = hints
            .provider("anidb")
            .and_then(|s| s.parse().ok())
            .and_then(|aid| self.mapping.from_anidb(aid))
        {
            tracing::debug!(mal_id = id, "mal id resolved via anidb mapping");
            return Ok(Some(id));
        }
        if let Some(id) = hints
            .provider("anilist")
            .and_then(|s| s.parse().ok())
            .and_then(|aid| self.mapping.from_anilist(aid))
        {
            tracing::debug!(mal_id = id, "mal id resolved via anilist mapping");
            return Ok(Some(id));
        }

        let Some(title) = hints.title.as_deref() else {
            return Ok(None);
        };
        for variant in title_variants(title) {
            let resp: SearchResponse = self
                .http
                .get_json(
                    &format!("{}/anime", self.base_url),
                    &[("q", variant.clone()), ("limit", "1".into())],
                )
                .await?;
            if let Some(hit) = resp.data.first() {
                return Ok(Some(hit.mal_id));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<AnimeData>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    data: AnimeData,
}

#[derive(Debug, Deserialize)]
struct AnimeData {
    mal_id: u64,
    #[serde(default)]
    score: Option<f32>,
}

#[async_trait]
impl EnrichmentSource for MalClient {
    fn name(&self) -> &'static str {
        "mal"
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        if !hints.is_anime {
            return None;
        }
        for provider in ["mal", "anidb", "anilist"] {
            if let Some(id) = hints.provider(provider) {
                return Some(format!("{provider}:{id}"));
            }
        }
        hints
            .title
            .as_deref()
            .map(|t| format!("title:{}", clean_title(t).to_lowercase()))
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        if !hints.is_anime {
            return Err(Error::SourceNotFound {
                source_name: "mal".into(),
            });
        }

        let mal_id = self.resolve_id(hints).await?.ok_or(Error::SourceNotFound {
            source_name: "mal".into(),
        })?;

        let detail: DetailResponse = self
            .http
            .get_json(&format!("{}/anime/{mal_id}", self.base_url), &[])
            .await?;

        let mut result = SourceResult::default();
        result
            .discovered_ids
            .insert("mal".into(), detail.data.mal_id.to_string());
        if let Some(score) = detail.data.score.filter(|s| *s > 0.0) {
            result.reviews.push(Review::new(
                ReviewSource::Mal,
                score,
                format!("{score:.2}"),
            ));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mapping() -> MalMapping {
        MalMapping::from_rows(vec![
            MappingRow {
                anidb_id: Some(16246),
                anilist_id: Some(143338),
                mal_id: 48926,
            },
            MappingRow {
                anidb_id: Some(1),
                anilist_id: None,
                mal_id: 100,
            },
        ])
    }

    fn client(base: &str) -> MalClient {
        MalClient::new(mapping(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    #[test]
    fn mapping_lookups() {
        let m = mapping();
        assert_eq!(m.from_anidb(16246), Some(48926));
        assert_eq!(m.from_anilist(143338), Some(48926));
        assert_eq!(m.from_anidb(999), None);
        assert!(!m.is_empty());
    }

    #[test]
    fn mapping_missing_file_is_empty() {
        let m = MalMapping::load(Path::new("/nonexistent/mapping.json")).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn mapping_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(
            &path,
            r#"[{"anidb_id": 7, "mal_id": 70}, {"anilist_id": 8, "mal_id": 80}]"#,
        )
        .unwrap();
        let m = MalMapping::load(&path).unwrap();
        assert_eq!(m.from_anidb(7), Some(70));
        assert_eq!(m.from_anilist(8), Some(80));
    }

    #[tokio::test]
    async fn anidb_mapping_skips_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/48926"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"mal_id": 48926, "score": 7.31}
            })))
            .mount(&server)
            .await;

        let mut hints = LookupHints {
            is_anime: true,
            ..Default::default()
        };
        hints.provider_ids.insert("anidb".into(), "16246".into());

        let result = client(&server.uri()).fetch(&hints).await.unwrap();
        assert_eq!(result.discovered_ids.get("mal").unwrap(), "48926");
        assert_eq!(result.reviews[0].source, ReviewSource::Mal);
    }

    #[tokio::test]
    async fn title_search_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime"))
            .and(query_param("q", "Frieren"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"mal_id": 52991, "score": null}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/anime/52991"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"mal_id": 52991, "score": 9.3}
            })))
            .mount(&server)
            .await;

        let hints = LookupHints {
            title: Some("Frieren".into()),
            is_anime: true,
            ..Default::default()
        };
        let result = client(&server.uri()).fetch(&hints).await.unwrap();
        assert_eq!(result.reviews[0].score, 9.3);
    }

    #[tokio::test]
    async fn non_anime_is_gated() {
        let client = client("http://127.0.0.1:1");
        let err = client.fetch(&LookupHints::default()).await.unwrap_err();
        assert_eq!(err.kind(), aph_core::ErrorKind::SourceNotFound);
    }
}
