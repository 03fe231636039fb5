//! Application configuration types.
//!
//! [`AppConfig`] is the bootstrap configuration: where the database and
//! poster store live, how to reach the catalog, engine tuning, and
//! rendering paths. Anything a user edits at runtime (API keys, badge
//! styles, review-source priorities) belongs to the database settings
//! store, not here. Each section carries workable defaults, so `{}` is a
//! legal config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level AppConfig
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub posters: PostersConfig,
    pub engine: EngineConfig,
    pub series: SeriesConfig,
    pub resolution: ResolutionConfig,
    pub render: RenderConfig,
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Deserialize an `AppConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::ConfigInvalid(format!("config parse error: {e}")))
    }

    /// Load configuration from an explicitly named file.
    ///
    /// A caller that names a config file wants that file, so a missing
    /// path is `config_missing` and a malformed one is `config_invalid`;
    /// silently running on defaults would mask both. Callers with no file
    /// to name use [`AppConfig::default`] instead.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigMissing(path.display().to_string())
            } else {
                Error::ConfigInvalid(format!("unreadable config {}: {e}", path.display()))
            }
        })?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Warnings for configurations that will run but probably not do what
    /// the operator intended. None of these are fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.catalog.url.is_empty() {
            warnings.push("catalog.url is empty".into());
        }
        if self.catalog.api_key.is_empty() {
            warnings.push("catalog.api_key is empty".into());
        }
        if self.engine.workers == 0 {
            warnings.push("engine.workers is 0; no items will be processed".into());
        }
        if self.engine.workers > 16 {
            warnings.push(format!(
                "engine.workers {} exceeds the supported maximum of 16",
                self.engine.workers
            ));
        }
        if self.series.sample_episodes == 0 {
            warnings.push("series.sample_episodes is 0; series items will resolve blind".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/aphrodite.db"),
        }
    }
}

/// Connection settings for the upstream media catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub url: String,
    pub api_key: String,
    /// Catalog user whose views/items are enumerated.
    pub user_id: String,
    /// Tag marking items whose posters we have badged.
    pub processed_tag: String,
    /// Requests per second allowed against the catalog host.
    pub requests_per_second: u32,
    /// Token-bucket burst size.
    pub burst: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Page size for item enumeration.
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            user_id: String::new(),
            processed_tag: "aphrodite-overlay".into(),
            requests_per_second: 10,
            burst: 20,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            page_size: 200,
        }
    }
}

/// Poster store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostersConfig {
    pub root: PathBuf,
}

impl Default for PostersConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/posters"),
        }
    }
}

/// Job engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed worker-pool size.
    pub workers: usize,
    /// Maximum attempts per item (first try + retries).
    pub max_attempts: u32,
    /// Per-item overall deadline in seconds.
    pub item_timeout_secs: u64,
    /// Ceiling for the exponential backoff between attempts.
    pub backoff_cap_secs: u64,
    /// Grace period given to in-flight HTTP calls on cancellation.
    pub cancel_grace_secs: u64,
    /// Whether a successful zero-badge run still sets the processed tag.
    pub tag_on_zero_badges: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            item_timeout_secs: 60,
            backoff_cap_secs: 30,
            cancel_grace_secs: 5,
            tag_on_zero_badges: false,
        }
    }
}

/// Series dominant-election tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// How many episodes to sample across seasons.
    pub sample_episodes: usize,
    /// Time budget for the whole sampling pass, in seconds.
    pub sample_budget_secs: u64,
    /// Whether a single HDR episode flips the series badge (OR election).
    /// When false, HDR requires a majority of sampled episodes.
    pub hdr_any_episode: bool,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            sample_episodes: 5,
            sample_budget_secs: 30,
            hdr_any_episode: true,
        }
    }
}

/// How to resolve a filename/stream resolution disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Choose the higher class (default).
    #[default]
    Higher,
    /// Trust the filename token when both are plausible.
    PreferFilename,
}

/// Resolution detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub conflict_policy: ConflictPolicy,
}

/// Rendering paths and placement defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directories searched for fonts by name.
    pub font_dirs: Vec<PathBuf>,
    /// Fallback font file name tried when the requested font is absent.
    pub fallback_font: Option<String>,
    /// Directory holding badge image assets.
    pub asset_dir: PathBuf,
    /// Edge padding in pixels for corner placement.
    pub edge_padding: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_dirs: vec![PathBuf::from("./fonts")],
            fallback_font: Some("DejaVuSans.ttf".into()),
            asset_dir: PathBuf::from("./assets/badges"),
            edge_padding: 30,
        }
    }
}

/// Enrichment source tuning that is not secret material.
///
/// API keys live in the `api_keys` settings table; this block carries rate
/// limits, cache TTLs, and offline dataset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Default cache TTL in days for enrichment responses.
    pub cache_ttl_days: i64,
    /// Per-call total budget in seconds.
    pub call_timeout_secs: u64,
    /// TMDb language/region.
    pub language: String,
    /// Path to the bundled AniDB→MAL / AniList→MAL mapping database.
    pub mal_mapping_path: Option<PathBuf>,
    /// Path to the Crunchyroll awards dataset.
    pub crunchyroll_dataset_path: Option<PathBuf>,
    /// Maximum review badges rendered per poster.
    pub max_review_badges: usize,
    /// Whether multiple award badges of equal tier may be shown.
    pub multiple_awards: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: 7,
            call_timeout_secs: 10,
            language: "en-US".into(),
            mal_mapping_path: None,
            crunchyroll_dataset_path: None,
            max_review_badges: 4,
            multiple_awards: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.catalog.processed_tag, "aphrodite-overlay");
        assert_eq!(cfg.engine.workers, 4);
        assert_eq!(cfg.engine.max_attempts, 3);
        assert_eq!(cfg.engine.item_timeout_secs, 60);
        assert_eq!(cfg.series.sample_episodes, 5);
        assert_eq!(cfg.sources.cache_ttl_days, 7);
        assert_eq!(cfg.render.edge_padding, 30);
        assert_eq!(cfg.resolution.conflict_policy, ConflictPolicy::Higher);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = AppConfig::from_json("{}").unwrap();
        assert_eq!(cfg.engine.workers, 4);
        assert_eq!(cfg.catalog.page_size, 200);
    }

    #[test]
    fn parse_partial_json() {
        let json = r#"{"engine": {"workers": 8}, "catalog": {"url": "http://jf:8096"}}"#;
        let cfg = AppConfig::from_json(json).unwrap();
        assert_eq!(cfg.engine.workers, 8);
        assert_eq!(cfg.catalog.url, "http://jf:8096");
        // untouched sections keep defaults
        assert_eq!(cfg.engine.max_attempts, 3);
    }

    #[test]
    fn invalid_json_is_config_invalid() {
        let err = AppConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn load_missing_file_is_config_missing() {
        let err = AppConfig::load(Path::new("/nonexistent/aphrodite.json")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigMissing);
    }

    #[test]
    fn load_reads_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aphrodite.json");
        std::fs::write(&path, r#"{"catalog": {"url": "http://jf:8096", "api_key": "k"}}"#)
            .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.catalog.url, "http://jf:8096");
        // unnamed sections still default
        assert_eq!(cfg.engine.workers, 4);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn empty_catalog_warns() {
        let cfg = AppConfig::default();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("catalog.url")));
        assert!(warnings.iter().any(|w| w.contains("catalog.api_key")));
    }

    #[test]
    fn zero_workers_warns() {
        let mut cfg = AppConfig::default();
        cfg.engine.workers = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("engine.workers")));
    }

    #[test]
    fn conflict_policy_serde() {
        let json = serde_json::to_string(&ConflictPolicy::PreferFilename).unwrap();
        assert_eq!(json, r#""prefer_filename""#);
    }
}
