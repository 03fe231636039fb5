//! Shared HTTP plumbing for enrichment sources.
//!
//! Every source funnels its requests through a [`SourceHttp`], which owns
//! the per-source token bucket and maps transport/status failures onto the
//! `source_*` error kinds.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use aph_core::{Error, Result};

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited HTTP helper bound to one source.
pub struct SourceHttp {
    source: &'static str,
    client: reqwest::Client,
    limiter: DirectLimiter,
}

impl SourceHttp {
    /// Build a helper with `rps` requests per second and a total per-call
    /// deadline of `timeout`.
    pub fn new(source: &'static str, rps: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build {source} http client: {e}")))?;

        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rps));

        Ok(Self {
            source,
            client,
            limiter,
        })
    }

    /// GET a JSON document, waiting for a rate-limit token first.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.limiter.until_ready().await;

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::source_unreachable(self.source, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                404 => Error::SourceNotFound {
                    source_name: self.source.to_string(),
                },
                429 => {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    Error::SourceRateLimited {
                        source_name: self.source.to_string(),
                        retry_after,
                    }
                }
                500..=599 => {
                    Error::source_unreachable(self.source, format!("returned {status}"))
                }
                _ => Error::source_invalid(self.source, format!("returned {status}")),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::source_invalid(self.source, format!("bad payload: {e}")))
    }

    /// The source this helper belongs to.
    pub fn source(&self) -> &'static str {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aph_core::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ok_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"v": 1})))
            .mount(&server)
            .await;

        let http = SourceHttp::new("omdb", 10, Duration::from_secs(5)).unwrap();
        let v: serde_json::Value = http
            .get_json(&format!("{}/data", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(v["v"], 1);
    }

    #[tokio::test]
    async fn status_mapping() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let http = SourceHttp::new("mdblist", 10, Duration::from_secs(5)).unwrap();

        let err = http
            .get_json::<serde_json::Value>(&format!("{}/missing", server.uri()), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);

        let err = http
            .get_json::<serde_json::Value>(&format!("{}/limited", server.uri()), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceRateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));

        let err = http
            .get_json::<serde_json::Value>(&format!("{}/down", server.uri()), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnreachable);
    }

    #[tokio::test]
    async fn bad_payload_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let http = SourceHttp::new("tmdb", 10, Duration::from_secs(5)).unwrap();
        let err = http
            .get_json::<serde_json::Value>(&server.uri(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceInvalidResponse);
    }
}
