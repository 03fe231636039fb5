//! Application wiring.
//!
//! [`AppContext::init`] builds every component from an [`AppConfig`] and a
//! settings store, passing handles explicitly so nothing hides behind a
//! global. Construction must happen inside a tokio runtime (the engine
//! spawns its worker pool).

use std::sync::Arc;
use std::time::Duration;

use aph_badge::{BadgeCatalog, FontLibrary, LayoutDirection, Renderer};
use aph_catalog::CatalogClient;
use aph_core::config::AppConfig;
use aph_core::events::ProgressBus;
use aph_core::{BadgeType, Result, ReviewSource};
use aph_db::{queries, DbPool, SettingsStore};
use aph_engine::{EngineDeps, JobEngine, SchedulerHook};
use aph_enrich::{
    AniDbClient, AwardsDataset, CachedSource, EnrichmentSource, MalClient, MalMapping,
    MdblistClient, OmdbClient, TmdbClient,
};
use aph_resolve::{AttributeResolver, ResolverOptions, ReviewPriority};
use aph_store::PosterStore;

/// The wired application.
pub struct AppContext {
    pub config: AppConfig,
    pub pool: DbPool,
    pub settings: SettingsStore,
    pub store: Arc<PosterStore>,
    pub catalog: Arc<CatalogClient>,
    pub bus: Arc<ProgressBus>,
    pub engine: Arc<JobEngine>,
    pub scheduler: SchedulerHook,
    pub posters: crate::posters::PosterOps,
}

impl AppContext {
    /// Build everything from configuration.
    pub fn init(config: AppConfig) -> Result<Self> {
        for warning in config.validate() {
            tracing::warn!("config: {warning}");
        }

        let pool = aph_db::init_pool(&config.database.path.to_string_lossy())?;
        {
            let conn = aph_db::get_conn(&pool)?;
            queries::review_sources::seed_defaults(&conn)?;
        }
        let settings = SettingsStore::new(pool.clone());

        let store = Arc::new(PosterStore::new(&config.posters.root)?);
        let catalog = Arc::new(CatalogClient::new(&config.catalog)?);
        let bus = Arc::new(ProgressBus::default());

        let (sources, tmdb) = build_sources(&config, &settings, &pool)?;
        let priorities = review_priorities(&settings)?;
        let resolver = Arc::new(AttributeResolver::new(
            catalog.clone(),
            sources,
            priorities,
            ResolverOptions {
                conflict_policy: config.resolution.conflict_policy,
                series: config.series.clone(),
                max_review_badges: config.sources.max_review_badges,
                multiple_awards: config.sources.multiple_awards,
            },
        ));

        let badges = Arc::new(BadgeCatalog::from_settings(|badge_type| {
            settings.badge_settings(badge_type).unwrap_or_else(|e| {
                tracing::warn!(badge = %badge_type, error = %e, "badge settings unavailable");
                Default::default()
            })
        }));
        let renderer = Arc::new(Renderer::new(
            FontLibrary::new(
                config.render.font_dirs.clone(),
                config.render.fallback_font.clone(),
            ),
            config.render.asset_dir.clone(),
            config.render.edge_padding,
            LayoutDirection::Vertical,
        ));

        let engine = JobEngine::start(EngineDeps {
            pool: pool.clone(),
            store: store.clone(),
            catalog: catalog.clone(),
            resolver,
            badges,
            renderer,
            bus: bus.clone(),
            engine_cfg: config.engine.clone(),
            processed_tag: config.catalog.processed_tag.clone(),
        });

        let scheduler = SchedulerHook::new(engine.clone(), catalog.clone(), pool.clone());
        let posters = crate::posters::PosterOps::new(
            catalog.clone(),
            store.clone(),
            engine.clone(),
            tmdb,
        )?;

        Ok(Self {
            config,
            pool,
            settings,
            store,
            catalog,
            bus,
            engine,
            scheduler,
            posters,
        })
    }
}

/// Construct the enrichment source set, in registry priority order:
/// ID-discovering sources first, awards last. Sources missing their API
/// key are left out. The bare TMDb client is also returned for poster
/// discovery.
fn build_sources(
    config: &AppConfig,
    settings: &SettingsStore,
    pool: &DbPool,
) -> Result<(Vec<Arc<dyn EnrichmentSource>>, Option<Arc<TmdbClient>>)> {
    let timeout = Duration::from_secs(config.sources.call_timeout_secs);
    let ttl = config.sources.cache_ttl_days;
    let mut sources: Vec<Arc<dyn EnrichmentSource>> = Vec::new();
    let mut tmdb: Option<Arc<TmdbClient>> = None;

    let cached = |inner: Arc<dyn EnrichmentSource>| -> Arc<dyn EnrichmentSource> {
        Arc::new(CachedSource::new(inner, pool.clone(), ttl))
    };

    match settings.api_key("tmdb")? {
        Some(key) => {
            let client = Arc::new(TmdbClient::new(
                key,
                config.sources.language.clone(),
                timeout,
            )?);
            tmdb = Some(client.clone());
            sources.push(cached(client));
        }
        None => tracing::info!("tmdb disabled: no api key configured"),
    }
    match settings.api_key("omdb")? {
        Some(key) => sources.push(cached(Arc::new(OmdbClient::new(key, timeout)?))),
        None => tracing::info!("omdb disabled: no api key configured"),
    }
    match settings.api_key("mdblist")? {
        Some(key) => sources.push(cached(Arc::new(MdblistClient::new(key, timeout)?))),
        None => tracing::info!("mdblist disabled: no api key configured"),
    }

    sources.push(cached(Arc::new(AniDbClient::new(
        "aphrodite".into(),
        timeout,
    )?)));

    let mapping = match &config.sources.mal_mapping_path {
        Some(path) => MalMapping::load(path)?,
        None => MalMapping::default(),
    };
    sources.push(cached(Arc::new(MalClient::new(mapping, timeout)?)));

    let awards = match &config.sources.crunchyroll_dataset_path {
        Some(path) => AwardsDataset::load(path)?,
        None => AwardsDataset::default(),
    };
    sources.push(Arc::new(awards));

    Ok((sources, tmdb))
}

/// Translate `review_sources` rows into resolver priorities.
fn review_priorities(settings: &SettingsStore) -> Result<Vec<ReviewPriority>> {
    let rows = settings.review_sources()?;
    let mut priorities = Vec::with_capacity(rows.len());
    for row in rows {
        let Ok(source) =
            serde_json::from_value::<ReviewSource>(serde_json::Value::String(row.name.clone()))
        else {
            tracing::warn!(name = %row.name, "unknown review source; ignoring");
            continue;
        };
        priorities.push(ReviewPriority {
            source,
            priority: row.priority,
            anime_only: row.conditions["anime_only"] == true,
        });
    }
    Ok(priorities)
}

/// Badge types parseable from CLI arguments.
pub fn parse_badge_types(names: &[String]) -> Result<Vec<BadgeType>> {
    names
        .iter()
        .map(|name| {
            serde_json::from_value(serde_json::Value::String(name.clone())).map_err(|_| {
                aph_core::Error::ConfigInvalid(format!(
                    "unknown badge type '{name}' (expected audio, resolution, review, awards)"
                ))
            })
        })
        .collect()
}
