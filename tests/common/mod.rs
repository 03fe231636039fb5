//! Shared test harness: a wired [`AppContext`] against a mock catalog
//! server, a temp poster store, and a file-backed SQLite database.
//!
//! Badge rules are seeded with asset mappings (and text fallback disabled)
//! so rendering never depends on fonts being installed on the test host.

#![allow(dead_code)]

use std::io::Cursor;
use std::time::Duration;

use tempfile::TempDir;
use tokio_stream::StreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aphrodite::AppContext;

use aph_core::config::AppConfig;
use aph_core::events::ProgressKind;
use aph_core::settings::SettingValue;
use aph_core::{BadgeType, JobId, JobStatus};

pub struct TestHarness {
    pub server: MockServer,
    pub ctx: AppContext,
    _tmp: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_workers(2).await
    }

    pub async fn with_workers(workers: usize) -> Self {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().expect("tempdir");

        let asset_dir = tmp.path().join("assets");
        std::fs::create_dir_all(&asset_dir).unwrap();
        for name in [
            "atmos.png", "eac3.png", "aac.png", "truehd.png", "4k.png", "4khdr.png",
            "1080p.png", "1080phdr.png", "720p.png", "480p.png", "crunchyroll.png",
        ] {
            std::fs::write(asset_dir.join(name), png_bytes(64, 32)).unwrap();
        }

        let db_path = tmp.path().join("aphrodite.db");
        seed_badge_rules(&db_path);

        let mut config = AppConfig::default();
        config.database.path = db_path;
        config.posters.root = tmp.path().join("posters");
        config.render.asset_dir = asset_dir;
        config.catalog.url = server.uri();
        config.catalog.api_key = "test-key".into();
        config.catalog.user_id = "u1".into();
        config.engine.workers = workers;
        config.engine.item_timeout_secs = 20;

        let ctx = AppContext::init(config).expect("context init");

        Self {
            server,
            ctx,
            _tmp: tmp,
        }
    }

    /// Mount the standard mocks for one item: metadata, image download,
    /// image upload, and tag update.
    pub async fn mount_item(&self, item_id: &str, metadata: serde_json::Value) {
        self.mount_item_with_delay(item_id, metadata, Duration::ZERO)
            .await;
    }

    pub async fn mount_item_with_delay(
        &self,
        item_id: &str,
        metadata: serde_json::Value,
        delay: Duration,
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/Users/u1/Items/{item_id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(metadata),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/Items/{item_id}/Images/Primary")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(png_bytes(400, 600)),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/Items/{item_id}/Images/Primary")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/Items/{item_id}")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// Wait for a job to reach a terminal status via its progress stream.
    pub async fn wait_terminal(&self, job_id: JobId) -> JobStatus {
        let mut stream = self.ctx.engine.stream_progress(job_id);
        while let Some(event) = stream.next().await {
            if let ProgressKind::JobStatus { status } = event.kind {
                if status.is_terminal() {
                    return status;
                }
            }
        }
        panic!("progress stream ended without a terminal status");
    }

    /// Count requests matching a method and path.
    pub async fn request_count(&self, http_method: &str, url_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.to_string() == http_method && r.url.path() == url_path)
            .count()
    }
}

/// Seed badge rules into a fresh database file before the context opens it:
/// asset mappings for audio/resolution, no text fallback.
fn seed_badge_rules(db_path: &std::path::Path) {
    let pool = aph_db::init_pool(&db_path.to_string_lossy()).expect("seed pool");
    let conn = aph_db::get_conn(&pool).expect("seed conn");

    let audio_mappings =
        r#"{"atmos": "atmos.png", "eac3": "eac3.png", "aac": "aac.png", "truehd": "truehd.png"}"#;
    let resolution_mappings = r#"{"4k": "4k.png", "4khdr": "4khdr.png",
        "1080p": "1080p.png", "1080phdr": "1080phdr.png", "720p": "720p.png", "480p": "480p.png"}"#;

    aph_db::queries::badge_settings::set(&conn, BadgeType::Audio, "mappings", audio_mappings)
        .unwrap();
    aph_db::queries::badge_settings::set(&conn, BadgeType::Audio, "fallback_to_text", "false")
        .unwrap();
    aph_db::queries::badge_settings::set(
        &conn,
        BadgeType::Resolution,
        "mappings",
        resolution_mappings,
    )
    .unwrap();
    aph_db::queries::badge_settings::set(&conn, BadgeType::Resolution, "fallback_to_text", "false")
        .unwrap();

    // Exercise the typed settings path too.
    aph_db::queries::settings::set(
        &conn,
        "test.seeded",
        &SettingValue::Boolean(true),
        "general",
    )
    .unwrap();
}

/// A small PNG for posters and assets.
pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([20, 40, 60, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Metadata for a 4K HDR Atmos movie.
pub fn movie_4k_hdr_atmos(id: &str) -> serde_json::Value {
    serde_json::json!({
        "Id": id,
        "Name": "Test Movie",
        "Type": "Movie",
        "ProductionYear": 2023,
        "Genres": ["Action"],
        "Tags": [],
        "ProviderIds": {},
        "MediaStreams": [
            {"Type": "Video", "Width": 3840, "Height": 2160,
             "VideoRange": "HDR", "VideoRangeType": "HDR10"},
            {"Type": "Audio", "Codec": "truehd", "Channels": 8,
             "IsDefault": true, "Title": "TrueHD Atmos 7.1"}
        ]
    })
}

/// Metadata for a plain 1080p EAC3 movie.
pub fn movie_1080p(id: &str) -> serde_json::Value {
    serde_json::json!({
        "Id": id,
        "Name": "Plain Movie",
        "Type": "Movie",
        "Tags": [],
        "MediaStreams": [
            {"Type": "Video", "Width": 1920, "Height": 1080},
            {"Type": "Audio", "Codec": "eac3", "Channels": 6, "IsDefault": true}
        ]
    })
}
