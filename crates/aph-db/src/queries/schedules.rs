//! Stored schedules, their options, and their target libraries.
//!
//! Cron-expression evaluation lives outside the core; callers compute due
//! times and pass them in.

use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeMap;

use aph_core::{Error, Result, ScheduleId};

use crate::models::Schedule;

const COLS: &str = "id, name, cron, enabled, last_run_at, next_run_at, created_at";

/// Create a schedule.
pub fn create(conn: &Connection, name: &str, cron: &str) -> Result<Schedule> {
    let id = ScheduleId::new();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO schedules (id, name, cron, enabled, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        rusqlite::params![id.to_string(), name, cron, &now],
    )
    .map_err(|e| Error::database(e))?;
    get(conn, id)?.ok_or_else(|| Error::database("schedule vanished after insert"))
}

/// Get a schedule by ID.
pub fn get(conn: &Connection, id: ScheduleId) -> Result<Option<Schedule>> {
    let q = format!("SELECT {COLS} FROM schedules WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], Schedule::from_row) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// All enabled schedules.
pub fn list_enabled(conn: &Connection) -> Result<Vec<Schedule>> {
    let q = format!("SELECT {COLS} FROM schedules WHERE enabled = 1 ORDER BY name");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([], Schedule::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// Record a run: set `last_run_at` to now and `next_run_at` to the supplied
/// marker.
pub fn mark_run(conn: &Connection, id: ScheduleId, next_run_at: Option<&str>) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE schedules SET last_run_at = ?1, next_run_at = ?2 WHERE id = ?3",
            rusqlite::params![&now, next_run_at, id.to_string()],
        )
        .map_err(|e| Error::database(e))?;
    Ok(n > 0)
}

/// Replace a schedule's options.
pub fn set_options(
    conn: &Connection,
    id: ScheduleId,
    options: &BTreeMap<String, String>,
) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e))?;
    tx.execute(
        "DELETE FROM schedule_options WHERE schedule_id = ?1",
        [id.to_string()],
    )
    .map_err(|e| Error::database(e))?;
    for (name, value) in options {
        tx.execute(
            "INSERT INTO schedule_options (schedule_id, name, value) VALUES (?1, ?2, ?3)",
            rusqlite::params![id.to_string(), name, value],
        )
        .map_err(|e| Error::database(e))?;
    }
    tx.commit().map_err(|e| Error::database(e))?;
    Ok(())
}

/// A schedule's options as a map.
pub fn options(conn: &Connection, id: ScheduleId) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT name, value FROM schedule_options WHERE schedule_id = ?1")
        .map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// Replace a schedule's target libraries.
pub fn set_targets(conn: &Connection, id: ScheduleId, library_ids: &[String]) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e))?;
    tx.execute(
        "DELETE FROM schedule_targets WHERE schedule_id = ?1",
        [id.to_string()],
    )
    .map_err(|e| Error::database(e))?;
    for lib in library_ids {
        tx.execute(
            "INSERT INTO schedule_targets (schedule_id, library_id) VALUES (?1, ?2)",
            rusqlite::params![id.to_string(), lib],
        )
        .map_err(|e| Error::database(e))?;
    }
    tx.commit().map_err(|e| Error::database(e))?;
    Ok(())
}

/// A schedule's target library IDs.
pub fn targets(conn: &Connection, id: ScheduleId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT library_id FROM schedule_targets WHERE schedule_id = ?1 ORDER BY library_id")
        .map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([id.to_string()], |row| row.get(0))
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}
