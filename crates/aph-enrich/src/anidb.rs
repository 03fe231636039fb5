//! AniDB client.
//!
//! Prefers an AniDB ID already present in catalog metadata; otherwise
//! searches by cleaned title. AniDB's acceptable-use policy demands at
//! least one second between requests, so the client enforces a minimum
//! interval on top of the token bucket.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use aph_core::{Error, Result, Review, ReviewSource};

use crate::http::SourceHttp;
use crate::source::{EnrichmentSource, LookupHints, SourceResult};
use crate::title::{clean_title, title_variants};

const DEFAULT_BASE_URL: &str = "https://api.anidb.net/httpapi";

/// Hard floor between consecutive AniDB requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

pub struct AniDbClient {
    http: SourceHttp,
    client_name: String,
    base_url: String,
    last_request: Mutex<Option<Instant>>,
}

impl AniDbClient {
    pub fn new(client_name: String, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new("anidb", 1, call_timeout)?,
            client_name,
            base_url: DEFAULT_BASE_URL.to_string(),
            last_request: Mutex::new(None),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sleep as needed so consecutive requests are ≥ 1 s apart.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, extra: &[(&str, String)]) -> Result<T> {
        self.pace().await;
        let mut query: Vec<(&str, String)> = vec![
            ("client", self.client_name.clone()),
            ("clientver", "1".into()),
            ("protover", "1".into()),
        ];
        query.extend_from_slice(extra);
        self.http.get_json(&self.base_url, &query).await
    }

    async fn search_id(&self, hints: &LookupHints) -> Result<Option<u64>> {
        let Some(title) = hints.title.as_deref() else {
            return Ok(None);
        };
        for variant in title_variants(title) {
            let resp: SearchResponse = self
                .get(&[("request", "search".into()), ("query", variant.clone())])
                .await?;
            if let Some(hit) = resp.results.first() {
                tracing::debug!(title = %variant, aid = hit.aid, "anidb title search hit");
                return Ok(Some(hit.aid));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    aid: u64,
}

#[derive(Debug, Deserialize)]
struct AnimeResponse {
    aid: u64,
    rating: Option<f32>,
}

#[async_trait]
impl EnrichmentSource for AniDbClient {
    fn name(&self) -> &'static str {
        "anidb"
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        if !hints.is_anime {
            return None;
        }
        if let Some(id) = hints.provider("anidb") {
            return Some(format!("id:{id}"));
        }
        hints
            .title
            .as_deref()
            .map(|t| format!("title:{}", clean_title(t).to_lowercase()))
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        if !hints.is_anime {
            return Err(Error::SourceNotFound {
                source_name: "anidb".into(),
            });
        }

        let aid = match hints.provider("anidb").and_then(|s| s.parse::<u64>().ok()) {
            Some(id) => id,
            None => self.search_id(hints).await?.ok_or(Error::SourceNotFound {
                source_name: "anidb".into(),
            })?,
        };

        let anime: AnimeResponse = self
            .get(&[("request", "anime".into()), ("aid", aid.to_string())])
            .await?;

        let mut result = SourceResult::default();
        result
            .discovered_ids
            .insert("anidb".into(), anime.aid.to_string());
        if let Some(rating) = anime.rating.filter(|r| *r > 0.0) {
            result.reviews.push(Review::new(
                ReviewSource::Anidb,
                rating,
                format!("{rating:.2}"),
            ));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> AniDbClient {
        AniDbClient::new("aphrodite".into(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    fn anime_hints(title: &str) -> LookupHints {
        LookupHints {
            title: Some(title.into()),
            is_anime: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn title_search_then_rating() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("request", "search"))
            .and(query_param("query", "Aharen-san wa Hakarenai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"aid": 16246}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("request", "anime"))
            .and(query_param("aid", "16246"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aid": 16246,
                "rating": 6.95
            })))
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .fetch(&anime_hints("Aharen-san wa Hakarenai"))
            .await
            .unwrap();

        assert_eq!(result.discovered_ids.get("anidb").unwrap(), "16246");
        assert_eq!(result.reviews.len(), 1);
        assert_eq!(result.reviews[0].source, ReviewSource::Anidb);
    }

    #[tokio::test]
    async fn non_anime_is_gated_without_io() {
        let client = client("http://127.0.0.1:1");
        let hints = LookupHints {
            title: Some("The Matrix".into()),
            is_anime: false,
            ..Default::default()
        };
        let err = client.fetch(&hints).await.unwrap_err();
        assert_eq!(err.kind(), aph_core::ErrorKind::SourceNotFound);
        assert!(client.cache_key(&hints).is_none());
    }

    #[tokio::test]
    async fn requests_are_paced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aid": 1,
                "rating": 5.0
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut hints = anime_hints("x");
        hints.provider_ids.insert("anidb".into(), "1".into());

        let start = std::time::Instant::now();
        client.fetch(&hints).await.unwrap();
        client.fetch(&hints).await.unwrap();
        // The second call must have waited out the minimum interval.
        assert!(start.elapsed() >= MIN_REQUEST_INTERVAL);
    }

    #[test]
    fn cache_key_prefers_id() {
        let client = AniDbClient::new("aphrodite".into(), Duration::from_secs(5)).unwrap();
        let mut hints = anime_hints("Aharen-san wa Hakarenai (2022)");
        assert_eq!(
            client.cache_key(&hints),
            Some("title:aharen-san wa hakarenai".into())
        );
        hints.provider_ids.insert("anidb".into(), "16246".into());
        assert_eq!(client.cache_key(&hints), Some("id:16246".into()));
    }
}
