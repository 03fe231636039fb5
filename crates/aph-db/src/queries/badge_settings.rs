//! Per-badge-type style and rule settings.
//!
//! Values are free-form strings; structured values (style blocks, symbol
//! mappings) are stored as JSON and decoded by the badge catalog.

use rusqlite::Connection;
use std::collections::BTreeMap;

use aph_core::{BadgeType, Error, Result};

use crate::models::enum_to_text;

/// One named value for a badge type.
pub fn get(conn: &Connection, badge_type: BadgeType, name: &str) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM badge_settings WHERE badge_type = ?1 AND name = ?2",
        [enum_to_text(&badge_type), name.to_string()],
        |row| row.get(0),
    ) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// Insert or replace a value.
pub fn set(conn: &Connection, badge_type: BadgeType, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO badge_settings (badge_type, name, value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(badge_type, name) DO UPDATE SET value = excluded.value",
        [enum_to_text(&badge_type), name.to_string(), value.to_string()],
    )
    .map_err(|e| Error::database(e))?;
    Ok(())
}

/// All values for a badge type, keyed by name.
pub fn all_for(conn: &Connection, badge_type: BadgeType) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT name, value FROM badge_settings WHERE badge_type = ?1")
        .map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([enum_to_text(&badge_type)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn set_get_all_for() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        set(&conn, BadgeType::Audio, "anchor", "top-right").unwrap();
        set(&conn, BadgeType::Audio, "style", r#"{"opacity": 0.8}"#).unwrap();
        set(&conn, BadgeType::Review, "anchor", "bottom-left").unwrap();

        assert_eq!(
            get(&conn, BadgeType::Audio, "anchor").unwrap().as_deref(),
            Some("top-right")
        );
        assert!(get(&conn, BadgeType::Awards, "anchor").unwrap().is_none());

        let audio = all_for(&conn, BadgeType::Audio).unwrap();
        assert_eq!(audio.len(), 2);
        assert!(audio.contains_key("style"));
    }
}
