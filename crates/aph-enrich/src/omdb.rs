//! OMDb client.
//!
//! One lookup by IMDb ID fans out to three ratings: IMDb, Rotten Tomatoes,
//! and Metacritic.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aph_core::{Error, Result, Review, ReviewSource};

use crate::http::SourceHttp;
use crate::source::{EnrichmentSource, LookupHints, SourceResult};

const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com";

pub struct OmdbClient {
    http: SourceHttp,
    api_key: String,
    base_url: String,
}

impl OmdbClient {
    pub fn new(api_key: String, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new("omdb", 5, call_timeout)?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Ratings", default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Debug, Deserialize)]
struct OmdbRating {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Parse OMDb's rating value forms: `8.7/10`, `87%`, `73/100`.
fn parse_score(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse().ok();
    }
    if let Some((num, _den)) = value.split_once('/') {
        return num.trim().parse().ok();
    }
    value.parse().ok()
}

#[async_trait]
impl EnrichmentSource for OmdbClient {
    fn name(&self) -> &'static str {
        "omdb"
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        hints.provider("imdb").map(String::from)
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        let imdb_id = hints.provider("imdb").ok_or(Error::SourceNotFound {
            source_name: "omdb".into(),
        })?;

        let resp: OmdbResponse = self
            .http
            .get_json(
                &self.base_url,
                &[
                    ("apikey", self.api_key.clone()),
                    ("i", imdb_id.to_string()),
                ],
            )
            .await?;

        if !resp.response.eq_ignore_ascii_case("true") {
            return Err(Error::SourceNotFound {
                source_name: "omdb".into(),
            });
        }

        let mut result = SourceResult::default();
        for rating in resp.ratings {
            let source = match rating.source.as_str() {
                "Internet Movie Database" => ReviewSource::Imdb,
                "Rotten Tomatoes" => ReviewSource::RottenTomatoes,
                "Metacritic" => ReviewSource::Metacritic,
                other => {
                    tracing::debug!(source = other, "skipping unrecognized omdb rating source");
                    continue;
                }
            };
            if let Some(score) = parse_score(&rating.value) {
                result.reviews.push(Review::new(source, score, rating.value));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aph_core::ErrorKind;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> OmdbClient {
        OmdbClient::new("k".into(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    fn imdb_hints(id: &str) -> LookupHints {
        let mut hints = LookupHints::default();
        hints.provider_ids.insert("imdb".into(), id.into());
        hints
    }

    #[test]
    fn score_forms() {
        assert_eq!(parse_score("8.7/10"), Some(8.7));
        assert_eq!(parse_score("87%"), Some(87.0));
        assert_eq!(parse_score("73/100"), Some(73.0));
        assert_eq!(parse_score("N/A"), None);
    }

    #[tokio::test]
    async fn one_call_yields_three_reviews() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("i", "tt0133093"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Title": "The Matrix",
                "Response": "True",
                "Ratings": [
                    {"Source": "Internet Movie Database", "Value": "8.7/10"},
                    {"Source": "Rotten Tomatoes", "Value": "83%"},
                    {"Source": "Metacritic", "Value": "73/100"},
                    {"Source": "Some Future Source", "Value": "9/10"}
                ]
            })))
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .fetch(&imdb_hints("tt0133093"))
            .await
            .unwrap();

        assert_eq!(result.reviews.len(), 3);
        assert_eq!(result.reviews[0].source, ReviewSource::Imdb);
        assert_eq!(result.reviews[0].score, 8.7);
        assert_eq!(result.reviews[1].source, ReviewSource::RottenTomatoes);
        assert_eq!(result.reviews[1].score, 83.0);
    }

    #[tokio::test]
    async fn omdb_false_response_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Response": "False",
                "Error": "Incorrect IMDb ID."
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .fetch(&imdb_hints("tt0000000"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    }

    #[tokio::test]
    async fn missing_imdb_id_is_not_found_without_io() {
        let client = client("http://127.0.0.1:1");
        let err = client.fetch(&LookupHints::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
        assert!(client.cache_key(&LookupHints::default()).is_none());
    }
}
