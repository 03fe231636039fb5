//! Catalog HTTP client.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use governor::{Quota, RateLimiter};

use aph_core::config::CatalogConfig;
use aph_core::{Error, ItemId, Result};

use crate::types::{CatalogItem, ImageBytes, ItemPage, Library, ViewsResponse};

/// Fields requested on every item fetch.
const ITEM_FIELDS: &str =
    "PrimaryImageAspectRatio,ImageTags,Overview,ProductionYear,Genres,Tags,MediaStreams,ProviderIds,Path";

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// HTTP client for the upstream media catalog.
///
/// Holds a shared [`reqwest::Client`] so connection pools are reused, and a
/// process-global token bucket so all workers share one rate budget.
#[derive(Debug)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    user_id: String,
    page_size: u32,
    limiter: Arc<DirectLimiter>,
}

impl CatalogClient {
    /// Build a client from catalog configuration.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::ConfigMissing("catalog.url".into()));
        }
        if config.api_key.is_empty() {
            return Err(Error::ConfigMissing("catalog.api_key".into()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build catalog http client: {e}")))?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(rps);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
            page_size: config.page_size,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.limiter.until_ready().await;
        let resp = self
            .http
            .get(self.url(path))
            .header("X-Emby-Token", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(resp).await
    }

    // -----------------------------------------------------------------------
    // Health and enumeration
    // -----------------------------------------------------------------------

    /// Probe the catalog. Returns `Ok` when it answers at all.
    pub async fn health(&self) -> Result<()> {
        self.get("/System/Info/Public", &[]).await.map(|_| ())
    }

    /// List the user's library views.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let resp = self
            .get(&format!("/Users/{}/Views", self.user_id), &[])
            .await?;
        let views: ViewsResponse = decode(resp).await?;
        Ok(views.items)
    }

    /// Fetch one page of items under a library. Restart with the cursor from
    /// [`ItemPage::next_cursor`].
    pub async fn list_items_page(&self, library_id: &str, start_index: u32) -> Result<ItemPage> {
        let resp = self
            .get(
                &format!("/Users/{}/Items", self.user_id),
                &[
                    ("ParentId", library_id.to_string()),
                    ("Recursive", "true".into()),
                    ("IncludeItemTypes", "Movie,Series".into()),
                    ("Fields", ITEM_FIELDS.into()),
                    ("StartIndex", start_index.to_string()),
                    ("Limit", self.page_size.to_string()),
                ],
            )
            .await?;
        decode(resp).await
    }

    /// Episodes of a series with stream metadata, for the dominant election.
    pub async fn list_episodes(&self, series_id: &str, limit: u32) -> Result<Vec<CatalogItem>> {
        let resp = self
            .get(
                &format!("/Users/{}/Items", self.user_id),
                &[
                    ("ParentId", series_id.to_string()),
                    ("Recursive", "true".into()),
                    ("IncludeItemTypes", "Episode".into()),
                    ("Fields", ITEM_FIELDS.into()),
                    ("Limit", limit.to_string()),
                ],
            )
            .await?;
        let page: ItemPage = decode(resp).await?;
        Ok(page.items)
    }

    /// Full metadata for one item.
    pub async fn get_item(&self, item_id: &ItemId) -> Result<CatalogItem> {
        let resp = self
            .get(
                &format!("/Users/{}/Items/{}", self.user_id, item_id),
                &[("Fields", ITEM_FIELDS.into())],
            )
            .await?;
        decode(resp).await
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    /// Download the primary image bytes.
    pub async fn get_primary_image(&self, item_id: &ItemId) -> Result<ImageBytes> {
        self.limiter.until_ready().await;
        let resp = self
            .http
            .get(self.url(&format!("/Items/{item_id}/Images/Primary")))
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::ImageFetchFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(match status.as_u16() {
                404 => Error::CatalogNotFound(format!("primary image for {item_id}")),
                _ => Error::ImageFetchFailed(format!("image fetch returned {status}")),
            });
        }

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::ImageFetchFailed(e.to_string()))?;
        Ok(ImageBytes {
            bytes: bytes.to_vec(),
            mime,
        })
    }

    /// Upload a new primary image. The catalog expects a base64-encoded body
    /// with the image content type.
    pub async fn put_primary_image(&self, item_id: &ItemId, bytes: &[u8], mime: &str) -> Result<()> {
        self.limiter.until_ready().await;
        tracing::debug!(item = %item_id, mime, size = bytes.len(), "uploading primary image");
        let body = base64::engine::general_purpose::STANDARD.encode(bytes);
        let resp = self
            .http
            .post(self.url(&format!("/Items/{item_id}/Images/Primary")))
            .header("X-Emby-Token", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(body)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(resp).await.map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Add a tag. No-op if the item already carries it.
    pub async fn add_tag(&self, item_id: &ItemId, tag: &str) -> Result<()> {
        self.update_tags(item_id, |tags| {
            if tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                false
            } else {
                tags.push(tag.to_string());
                true
            }
        })
        .await
    }

    /// Remove a tag. No-op if the item does not carry it.
    pub async fn remove_tag(&self, item_id: &ItemId, tag: &str) -> Result<()> {
        self.update_tags(item_id, |tags| {
            let before = tags.len();
            tags.retain(|t| !t.eq_ignore_ascii_case(tag));
            tags.len() != before
        })
        .await
    }

    /// Fetch the raw item, apply `mutate` to its tag list, and post the
    /// update back when anything changed.
    async fn update_tags<F>(&self, item_id: &ItemId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<String>) -> bool,
    {
        let resp = self
            .get(&format!("/Users/{}/Items/{}", self.user_id, item_id), &[])
            .await?;
        let mut raw: serde_json::Value = decode(resp).await?;

        let mut tags: Vec<String> = raw
            .get("Tags")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        if !mutate(&mut tags) {
            return Ok(());
        }
        tracing::debug!(item = %item_id, ?tags, "updating item tags");
        raw["Tags"] = serde_json::json!(tags);

        self.limiter.until_ready().await;
        let resp = self
            .http
            .post(self.url(&format!("/Items/{item_id}")))
            .header("X-Emby-Token", &self.api_key)
            .json(&raw)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(resp).await.map(|_| ())
    }
}

/// Map transport-level failures (connect refused, DNS, timeout) onto
/// `catalog_unreachable`.
fn map_transport(e: reqwest::Error) -> Error {
    Error::CatalogUnreachable(e.to_string())
}

/// Map non-success statuses onto catalog error kinds, honoring `Retry-After`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let err = match status.as_u16() {
        401 | 403 => Error::CatalogUnauthorized(format!("catalog returned {status}")),
        404 => Error::CatalogNotFound(resp.url().path().to_string()),
        429 => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Error::CatalogRateLimited { retry_after }
        }
        500..=599 => Error::CatalogUnreachable(format!("catalog returned {status}")),
        _ => Error::CatalogInvalidResponse(format!("catalog returned {status}")),
    };
    Err(err)
}

/// Decode a JSON body, mapping failures onto `catalog_invalid_response`.
async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    resp.json::<T>()
        .await
        .map_err(|e| Error::CatalogInvalidResponse(format!("bad catalog payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aph_core::ErrorKind;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> CatalogConfig {
        CatalogConfig {
            url: url.to_string(),
            api_key: "test-key".into(),
            user_id: "user1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_url_is_config_missing() {
        let cfg = CatalogConfig {
            api_key: "k".into(),
            ..Default::default()
        };
        let err = CatalogClient::new(&cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    }

    #[tokio::test]
    async fn list_libraries_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/user1/Views"))
            .and(header("X-Emby-Token", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Items": [
                    {"Id": "lib1", "Name": "Movies", "CollectionType": "movies"},
                    {"Id": "lib2", "Name": "Shows"}
                ]
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        let libs = client.list_libraries().await.unwrap();
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[0].name, "Movies");
        assert_eq!(libs[1].collection_type, None);
    }

    #[tokio::test]
    async fn paged_items_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/user1/Items"))
            .and(query_param("StartIndex", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Items": [{"Id": "a"}, {"Id": "b"}],
                "StartIndex": 0,
                "TotalRecordCount": 3
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        let page = client.list_items_page("lib1", 0).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor(), Some(2));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogUnauthorized);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogRateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn image_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/i1/Images/Primary"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Items/i1/Images/Primary"))
            .and(header("Content-Type", "image/png"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        let item = ItemId::new("i1");

        let img = client.get_primary_image(&item).await.unwrap();
        assert_eq!(img.mime, "image/png");
        assert_eq!(img.bytes, vec![1, 2, 3]);

        client
            .put_primary_image(&item, &img.bytes, &img.mime)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_tag_skips_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/user1/Items/i2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Id": "i2",
                "Tags": ["aphrodite-overlay"]
            })))
            .mount(&server)
            .await;
        // No POST mock mounted: an unexpected update attempt would 404 and fail.

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        client
            .add_tag(&ItemId::new("i2"), "Aphrodite-Overlay")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_tag_posts_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/user1/Items/i3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Id": "i3",
                "Tags": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Items/i3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = CatalogClient::new(&config(&server.uri())).unwrap();
        client
            .add_tag(&ItemId::new("i3"), "aphrodite-overlay")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_maps_to_kind() {
        // Point at a port with nothing listening.
        let client = CatalogClient::new(&config("http://127.0.0.1:1")).unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogUnreachable);
        assert!(err.is_retryable());
    }
}
