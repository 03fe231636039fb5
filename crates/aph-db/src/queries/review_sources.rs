//! Review source enablement and priority.

use rusqlite::Connection;

use aph_core::{Error, Result};

use crate::models::ReviewSourceRow;

const COLS: &str = "name, enabled, priority, conditions";

/// Insert or replace a source row.
pub fn upsert(
    conn: &Connection,
    name: &str,
    enabled: bool,
    priority: i64,
    conditions: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO review_sources (name, enabled, priority, conditions)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             enabled = excluded.enabled,
             priority = excluded.priority,
             conditions = excluded.conditions",
        rusqlite::params![name, enabled as i64, priority, conditions.to_string()],
    )
    .map_err(|e| Error::database(e))?;
    Ok(())
}

/// Enabled sources ordered by ascending priority (lower = first).
pub fn list_enabled(conn: &Connection) -> Result<Vec<ReviewSourceRow>> {
    let q = format!("SELECT {COLS} FROM review_sources WHERE enabled = 1 ORDER BY priority ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([], ReviewSourceRow::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// All sources, enabled or not.
pub fn list_all(conn: &Connection) -> Result<Vec<ReviewSourceRow>> {
    let q = format!("SELECT {COLS} FROM review_sources ORDER BY priority ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([], ReviewSourceRow::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// Seed the canonical source set if the table is empty.
///
/// Priorities follow the default badge ordering; anime-only sources carry a
/// condition consumed by the resolver.
pub fn seed_defaults(conn: &Connection) -> Result<()> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM review_sources", [], |r| r.get(0))
        .map_err(|e| Error::database(e))?;
    if count > 0 {
        return Ok(());
    }

    let defaults: &[(&str, i64, serde_json::Value)] = &[
        ("imdb", 10, serde_json::json!({})),
        ("rotten_tomatoes", 20, serde_json::json!({})),
        ("metacritic", 30, serde_json::json!({})),
        ("tmdb", 40, serde_json::json!({})),
        ("mdblist", 50, serde_json::json!({})),
        ("anidb", 60, serde_json::json!({"anime_only": true})),
        ("mal", 70, serde_json::json!({"anime_only": true})),
    ];
    for (name, priority, conditions) in defaults {
        upsert(conn, name, true, *priority, conditions)?;
    }
    Ok(())
}
