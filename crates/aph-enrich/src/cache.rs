//! Read-through cache wrapper for enrichment sources.
//!
//! Hits are served without I/O. Both positive results and not-found answers
//! are cached so a missing item does not hammer its source until the TTL
//! lapses. Expired rows are treated as absent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use aph_core::{Error, Result};
use aph_db::{get_conn, queries, DbPool};

use crate::source::{EnrichmentSource, LookupHints, SourceResult};

/// Cached payload shape: found results and not-found markers share one row.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAnswer {
    found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<SourceResult>,
}

/// Wraps a source with the `(source, logical_key)` response cache.
pub struct CachedSource {
    inner: Arc<dyn EnrichmentSource>,
    pool: DbPool,
    ttl: Duration,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn EnrichmentSource>, pool: DbPool, ttl_days: i64) -> Self {
        Self {
            inner,
            pool,
            ttl: Duration::days(ttl_days.max(1)),
        }
    }
}

#[async_trait]
impl EnrichmentSource for CachedSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn cache_key(&self, hints: &LookupHints) -> Option<String> {
        self.inner.cache_key(hints)
    }

    async fn fetch(&self, hints: &LookupHints) -> Result<SourceResult> {
        let Some(key) = self.inner.cache_key(hints) else {
            // Uncacheable lookup: pass straight through.
            return self.inner.fetch(hints).await;
        };

        let now = Utc::now();
        {
            let conn = get_conn(&self.pool)?;
            if let Some(entry) = queries::source_cache::get(&conn, self.name(), &key, now)? {
                if let Ok(answer) = serde_json::from_value::<CachedAnswer>(entry.payload) {
                    tracing::debug!(source = self.name(), key = %key, "enrichment cache hit");
                    return match answer {
                        CachedAnswer {
                            found: true,
                            result: Some(result),
                        } => Ok(result),
                        _ => Err(Error::SourceNotFound {
                            source_name: self.name().to_string(),
                        }),
                    };
                }
            }
        }

        let outcome = self.inner.fetch(hints).await;

        let answer = match &outcome {
            Ok(result) => Some(CachedAnswer {
                found: true,
                result: Some(result.clone()),
            }),
            Err(Error::SourceNotFound { .. }) => Some(CachedAnswer {
                found: false,
                result: None,
            }),
            // Transient failures are never cached.
            Err(_) => None,
        };

        if let Some(answer) = answer {
            let payload = serde_json::to_value(&answer).map_err(|e| Error::database(e))?;
            let conn = get_conn(&self.pool)?;
            queries::source_cache::put(&conn, self.name(), &key, &payload, self.ttl, now)?;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aph_core::{Review, ReviewSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        found: bool,
    }

    #[async_trait]
    impl EnrichmentSource for Counting {
        fn name(&self) -> &'static str {
            "omdb"
        }
        fn cache_key(&self, hints: &LookupHints) -> Option<String> {
            hints.provider("imdb").map(String::from)
        }
        async fn fetch(&self, _hints: &LookupHints) -> Result<SourceResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.found {
                Ok(SourceResult {
                    reviews: vec![Review::new(ReviewSource::Imdb, 8.0, "8.0")],
                    ..Default::default()
                })
            } else {
                Err(Error::SourceNotFound {
                    source_name: "omdb".into(),
                })
            }
        }
    }

    fn hints_with_imdb() -> LookupHints {
        let mut hints = LookupHints::default();
        hints.provider_ids.insert("imdb".into(), "tt42".into());
        hints
    }

    #[tokio::test]
    async fn second_fetch_hits_cache() {
        let pool = aph_db::init_memory_pool().unwrap();
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            found: true,
        });
        let cached = CachedSource::new(inner.clone(), pool, 7);

        let hints = hints_with_imdb();
        let r1 = cached.fetch(&hints).await.unwrap();
        let r2 = cached.fetch(&hints).await.unwrap();

        assert_eq!(r1.reviews.len(), 1);
        assert_eq!(r2.reviews.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_cached() {
        let pool = aph_db::init_memory_pool().unwrap();
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            found: false,
        });
        let cached = CachedSource::new(inner.clone(), pool, 7);

        let hints = hints_with_imdb();
        assert!(cached.fetch(&hints).await.is_err());
        assert!(cached.fetch(&hints).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncacheable_lookup_passes_through() {
        let pool = aph_db::init_memory_pool().unwrap();
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            found: true,
        });
        let cached = CachedSource::new(inner.clone(), pool, 7);

        // No imdb id: cache_key is None, every call goes to the source.
        let hints = LookupHints::default();
        cached.fetch(&hints).await.unwrap();
        cached.fetch(&hints).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
