//! TMDB (The Movie Database) client.
//!
//! Looks up community ratings by TMDb ID when the catalog supplies one,
//! otherwise searches by cleaned title and year. A successful movie lookup
//! also surfaces the IMDb ID for downstream sources.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aph_core::{Error, ItemKind, Result, Review, ReviewSource};

use crate::http::SourceHttp;
use crate::source::{EnrichmentSource, LookupHints, SourceResult};
use crate::title::clean_title;

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

pub struct TmdbClient {
    http: SourceHttp,
    api_key: String,
    language: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String, language: String, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new("tmdb", 30, call_timeout)?,
            api_key,
            language,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn is_tv(hints: &LookupHints) -> bool {
        matches!(hints.kind, Some(ItemKind::Series) | Some(ItemKind::Episode))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<T> {
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("language", self.language.clone()),
        ];
        query.extend_from_slice(extra);
        self.http
            .get_json(&format!("{}{path}", self.base_url), &query)
            .await
    }

    /// Discover candidate posters for an item, best first.
    ///
    /// Used by the poster-replacement surface; badge resolution never calls
    /// this.
    pub async fn poster_sources(&self, hints: &LookupHints) -> Result<Vec<PosterCandidate>> {
        let id = match hints.provider("tmdb").and_then(|s| s.parse::<u64>().ok()) {
            Some(id) => id,
            None => self.search(hints).await?.ok_or(Error::SourceNotFound {
                source_name: "tmdb".into(),
            })?,
        };

        let path = if Self::is_tv(hints) {
            format!("/tv/{id}/images")
        } else {
            format!("/movie/{id}/images")
        };
        // Posters come back for every language unless filtered.
        let resp: ImagesResponse = self
            .get(&path, &[("include_image_language", "en,null".into())])
            .await?;

        Ok(resp
            .posters
            .into_iter()
            .filter_map(|p| {
                let file_path = p.file_path?;
                Some(PosterCandidate {
                    url: format!("{IMAGE_BASE_URL}/original{file_path}"),
                    width: p.width,
                    height: p.height,
                })
            })
            .collect())
    }

    async fn search(&self, hints: &LookupHints) -> Result<Option<u64>> {
        let Some(title) = hints.title.as_deref() else {
            return Ok(None);
        };
        let query = clean_title(title);
        let (path, year_param) = if Self::is_tv(hints) {
            ("/search/tv", "first_air_date_year")
        } else {
            ("/search/movie", "year")
        };

        let mut params: Vec<(&str, String)> = vec![("query", query)];
        if let Some(year) = hints.year {
            params.push((year_param, year.to_string()));
        }

        let resp: SearchResponse = self.get(path, &params).await?;
        Ok(resp.results.first().map(|r| r.id))
    }
}

/// One candidate poster discovered on TMDb.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterCandidate {
    /// Full URL of the original-size image.
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Details {
    id: u64,
    vote_average: Option<f64>,
    #[serde(default)]
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    posters: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    file_path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[async_trait]
impl EnrichmentSource for TmdbClient {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        if let Some(id) = hints.provider("tmdb") {
            return Some(format!("id:{id}"));
        }
        hints.title.as_deref().map(|t| {
            format!(
                "title:{}:{}",
                clean_title(t).to_lowercase(),
                hints.year.map(|y| y.to_string()).unwrap_or_default()
            )
        })
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        let id = match hints.provider("tmdb").and_then(|s| s.parse::<u64>().ok()) {
            Some(id) => id,
            None => self.search(hints).await?.ok_or(Error::SourceNotFound {
                source_name: "tmdb".into(),
            })?,
        };

        let path = if Self::is_tv(hints) {
            format!("/tv/{id}")
        } else {
            format!("/movie/{id}")
        };
        let details: Details = self.get(&path, &[]).await?;

        let mut result = SourceResult::default();
        result
            .discovered_ids
            .insert("tmdb".into(), details.id.to_string());
        if let Some(imdb) = details.imdb_id.filter(|s| !s.is_empty()) {
            result.discovered_ids.insert("imdb".into(), imdb);
        }
        if let Some(avg) = details.vote_average.filter(|v| *v > 0.0) {
            result.reviews.push(Review::new(
                ReviewSource::Tmdb,
                avg as f32,
                format!("{avg:.1}"),
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

    fn client(base: &str) -> TmdbClient {
        TmdbClient::new("k".into(), "en-US".into(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    #[tokio::test]
    async fn direct_id_lookup_discovers_imdb() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 603,
                "vote_average": 8.2,
                "imdb_id": "tt0133093"
            })))
            .mount(&server)
            .await;

        let mut hints = LookupHints::default();
        hints.kind = Some(ItemKind::Movie);
        hints.provider_ids.insert("tmdb".into(), "603".into());

        let result = client(&server.uri()).fetch(&hints).await.unwrap();
        assert_eq!(result.reviews.len(), 1);
        assert_eq!(result.reviews[0].source, ReviewSource::Tmdb);
        assert_eq!(result.discovered_ids.get("imdb").unwrap(), "tt0133093");
    }

    #[tokio::test]
    async fn title_search_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .and(query_param("query", "Spy x Family"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": 120089}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/120089"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 120089,
                "vote_average": 8.5
            })))
            .mount(&server)
            .await;

        let mut hints = LookupHints::default();
        hints.kind = Some(ItemKind::Series);
        hints.title = Some("Spy x Family Season 2".into());

        let result = client(&server.uri()).fetch(&hints).await.unwrap();
        assert_eq!(result.discovered_ids.get("tmdb").unwrap(), "120089");
        assert_eq!(result.reviews[0].score, 8.5);
    }

    #[tokio::test]
    async fn empty_search_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})),
            )
            .mount(&server)
            .await;

        let mut hints = LookupHints::default();
        hints.title = Some("Unknown Film".into());

        let err = client(&server.uri()).fetch(&hints).await.unwrap_err();
        assert_eq!(err.kind(), aph_core::ErrorKind::SourceNotFound);
    }

    #[tokio::test]
    async fn poster_sources_build_full_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posters": [
                    {"file_path": "/abc.jpg", "width": 2000, "height": 3000},
                    {"file_path": null}
                ]
            })))
            .mount(&server)
            .await;

        let mut hints = LookupHints::default();
        hints.kind = Some(ItemKind::Movie);
        hints.provider_ids.insert("tmdb".into(), "603".into());

        let posters = client(&server.uri()).poster_sources(&hints).await.unwrap();
        assert_eq!(posters.len(), 1);
        assert_eq!(posters[0].url, "https://image.tmdb.org/t/p/original/abc.jpg");
        assert_eq!(posters[0].width, Some(2000));
    }

    #[test]
    fn cache_key_prefers_id() {
        let client = TmdbClient::new("k".into(), "en-US".into(), Duration::from_secs(5)).unwrap();
        let mut hints = LookupHints::default();
        hints.title = Some("The Matrix (1999)".into());
        hints.year = Some(1999);
        assert_eq!(
            client.cache_key(&hints),
            Some("title:the matrix:1999".into())
        );

        hints.provider_ids.insert("tmdb".into(), "603".into());
        assert_eq!(client.cache_key(&hints), Some("id:603".into()));
    }
}
