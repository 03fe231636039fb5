//! Poster source discovery and replacement.
//!
//! These operations sit outside the badging pipeline: they discover
//! alternative posters on TMDb, swap an item's canonical original for a
//! downloaded or user-supplied image, and optionally re-badge afterwards
//! through a normal single-item job.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use aph_catalog::CatalogClient;
use aph_core::{BadgeMask, Error, ItemId, JobId, Result};
use aph_engine::JobEngine;
use aph_enrich::{LookupHints, PosterCandidate, TmdbClient};
use aph_store::PosterStore;

/// Timeout for downloading a replacement poster.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Poster discovery/replacement surface.
pub struct PosterOps {
    catalog: Arc<CatalogClient>,
    store: Arc<PosterStore>,
    engine: Arc<JobEngine>,
    tmdb: Option<Arc<TmdbClient>>,
    http: reqwest::Client,
}

impl PosterOps {
    pub fn new(
        catalog: Arc<CatalogClient>,
        store: Arc<PosterStore>,
        engine: Arc<JobEngine>,
        tmdb: Option<Arc<TmdbClient>>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build poster http client: {e}")))?;
        Ok(Self {
            catalog,
            store,
            engine,
            tmdb,
            http,
        })
    }

    /// Candidate replacement posters for an item, best first.
    pub async fn fetch_sources(&self, item_id: &ItemId) -> Result<Vec<PosterCandidate>> {
        let tmdb = self.tmdb.as_ref().ok_or_else(|| {
            Error::ConfigMissing("tmdb api key (poster discovery needs tmdb)".into())
        })?;

        let meta = self.catalog.get_item(item_id).await?;
        let mut provider_ids = BTreeMap::new();
        for (k, v) in &meta.provider_ids.0 {
            provider_ids.insert(k.to_ascii_lowercase(), v.clone());
        }
        let hints = LookupHints {
            title: meta.name.clone(),
            year: meta.production_year,
            kind: meta.kind(),
            is_anime: meta.is_anime(),
            provider_ids,
        };
        tmdb.poster_sources(&hints).await
    }

    /// Replace an item's poster with one downloaded from `source_url`, then
    /// submit a badging job over it.
    pub async fn replace(
        &self,
        item_id: &ItemId,
        source_url: &str,
        mask: BadgeMask,
    ) -> Result<JobId> {
        let resp = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| Error::ImageFetchFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::ImageFetchFailed(format!(
                "poster source returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::ImageFetchFailed(e.to_string()))?;

        self.install(item_id, &bytes).await?;
        self.engine.submit_single(
            item_id.clone(),
            mask,
            serde_json::json!({ "replaced_from": source_url }),
        )
    }

    /// Install user-supplied poster bytes, optionally badging them.
    ///
    /// With `apply_badges` false the image is uploaded as-is and becomes
    /// the new stored original; a tracking job is returned only when
    /// badging was requested.
    pub async fn upload_custom(
        &self,
        item_id: &ItemId,
        bytes: &[u8],
        apply_badges: bool,
    ) -> Result<Option<JobId>> {
        self.install(item_id, bytes).await?;
        if !apply_badges {
            return Ok(None);
        }
        self.engine
            .submit_single(item_id.clone(), BadgeMask::all(), serde_json::json!({}))
            .map(Some)
    }

    /// Validate, store as the new original, and upload to the catalog.
    async fn install(&self, item_id: &ItemId, bytes: &[u8]) -> Result<()> {
        // Reject bytes that do not decode before touching any state.
        image::load_from_memory(bytes)
            .map_err(|e| Error::ImageInvalid(format!("replacement poster: {e}")))?;
        let mime = match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::WebP) => "image/webp",
            _ => "image/jpeg",
        };

        self.store.replace_original(item_id, bytes)?;
        self.catalog.put_primary_image(item_id, bytes, mime).await?;
        tracing::info!(item = %item_id, "poster replaced");
        Ok(())
    }
}
