//! API key storage, grouped by service.

use rusqlite::Connection;

use aph_core::{Error, Result};

/// Look up one key value.
pub fn get(conn: &Connection, service: &str, name: &str, group: &str) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM api_keys WHERE service = ?1 AND name = ?2 AND key_group = ?3",
        [service, name, group],
        |row| row.get(0),
    ) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// Insert or replace a key.
pub fn set(conn: &Connection, service: &str, name: &str, value: &str, group: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO api_keys (service, name, value, key_group)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(service, name, key_group) DO UPDATE SET value = excluded.value",
        [service, name, value, group],
    )
    .map_err(|e| Error::database(e))?;
    Ok(())
}

/// All (name, value) pairs for a service in the default group.
pub fn list_service(conn: &Connection, service: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, value FROM api_keys
             WHERE service = ?1 AND key_group = 'default' ORDER BY name",
        )
        .map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([service], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}
