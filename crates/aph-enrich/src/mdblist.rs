//! MDBList aggregate ratings client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aph_core::{Error, Result, Review, ReviewSource};

use crate::http::SourceHttp;
use crate::source::{EnrichmentSource, LookupHints, SourceResult};

const DEFAULT_BASE_URL: &str = "https://api.mdblist.com";

pub struct MdblistClient {
    http: SourceHttp,
    api_key: String,
    base_url: String,
}

impl MdblistClient {
    pub fn new(api_key: String, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: SourceHttp::new("mdblist", 5, call_timeout)?,
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
struct MdblistResponse {
    /// Aggregate score on a 0–100 scale.
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    response: Option<bool>,
}

#[async_trait]
impl EnrichmentSource for MdblistClient {
    fn name(&self) -> &'static str {
        "mdblist"
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        hints.provider("imdb").map(String::from)
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        let imdb_id = hints.provider("imdb").ok_or(Error::SourceNotFound {
            source_name: "mdblist".into(),
        })?;

        let resp: MdblistResponse = self
            .http
            .get_json(
                &self.base_url,
                &[
                    ("apikey", self.api_key.clone()),
                    ("i", imdb_id.to_string()),
                ],
            )
            .await?;

        if resp.response == Some(false) {
            return Err(Error::SourceNotFound {
                source_name: "mdblist".into(),
            });
        }

        let mut result = SourceResult::default();
        if let Some(score) = resp.score.filter(|s| *s > 0.0) {
            result.reviews.push(Review::new(
                ReviewSource::Mdblist,
                score,
                format!("{score:.0}"),
            ));
        }
        Ok(result)
    }
}
