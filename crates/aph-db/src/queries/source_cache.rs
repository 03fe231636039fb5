//! Enrichment response cache with TTL.
//!
//! Readers treat an expired entry as absent; expired rows are deleted
//! lazily on read and in bulk by [`sweep`]. Writes are last-writer-wins.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use aph_core::{Error, Result};

use crate::models::CacheEntry;

/// Fetch a cache entry if present and not expired.
///
/// An expired row is deleted on the way out and reported as a miss.
pub fn get(conn: &Connection, source: &str, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
    let entry = match conn.query_row(
        "SELECT source, key, payload, fetched_at, expires_at
         FROM source_cache WHERE source = ?1 AND key = ?2",
        [source, key],
        CacheEntry::from_row,
    ) {
        Ok(e) => e,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(Error::database(e)),
    };

    let expires = DateTime::parse_from_rfc3339(&entry.expires_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("bad expires_at in cache: {e}")))?;

    if expires <= now {
        conn.execute(
            "DELETE FROM source_cache WHERE source = ?1 AND key = ?2",
            [source, key],
        )
        .map_err(|e| Error::database(e))?;
        return Ok(None);
    }

    Ok(Some(entry))
}

/// Store a payload with a TTL. Replaces any existing entry for the key.
pub fn put(
    conn: &Connection,
    source: &str,
    key: &str,
    payload: &serde_json::Value,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let expires = now + ttl;
    conn.execute(
        "INSERT INTO source_cache (source, key, payload, fetched_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(source, key) DO UPDATE SET
             payload = excluded.payload,
             fetched_at = excluded.fetched_at,
             expires_at = excluded.expires_at",
        rusqlite::params![
            source,
            key,
            payload.to_string(),
            now.to_rfc3339(),
            expires.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e))?;
    Ok(())
}

/// Delete all expired entries. Returns how many were removed.
pub fn sweep(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let n = conn
        .execute(
            "DELETE FROM source_cache WHERE expires_at <= ?1",
            [now.to_rfc3339()],
        )
        .map_err(|e| Error::database(e))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn put_get_roundtrip() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        let payload = serde_json::json!({"imdb": "8.0"});
        put(&conn, "omdb", "tt0133093", &payload, Duration::days(7), now).unwrap();

        let hit = get(&conn, "omdb", "tt0133093", now).unwrap().unwrap();
        assert_eq!(hit.payload, payload);
        assert!(get(&conn, "omdb", "tt9999999", now).unwrap().is_none());
    }

    #[test]
    fn expired_entry_is_a_miss_and_deleted() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        put(
            &conn,
            "anidb",
            "title:aharen",
            &serde_json::json!(1),
            Duration::days(1),
            now,
        )
        .unwrap();

        let later = now + Duration::days(2);
        assert!(get(&conn, "anidb", "title:aharen", later).unwrap().is_none());

        // the lazy delete removed the row entirely
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM source_cache", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn put_replaces_existing() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        put(&conn, "mdblist", "k", &serde_json::json!(1), Duration::days(1), now).unwrap();
        put(&conn, "mdblist", "k", &serde_json::json!(2), Duration::days(1), now).unwrap();

        let hit = get(&conn, "mdblist", "k", now).unwrap().unwrap();
        assert_eq!(hit.payload, serde_json::json!(2));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        put(&conn, "a", "old", &serde_json::json!(1), Duration::seconds(-10), now).unwrap();
        put(&conn, "a", "fresh", &serde_json::json!(2), Duration::days(1), now).unwrap();

        assert_eq!(sweep(&conn, now).unwrap(), 1);
        assert!(get(&conn, "a", "fresh", now).unwrap().is_some());
    }
}
