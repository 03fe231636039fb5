//! Append-only operation history.

use chrono::Utc;
use rusqlite::Connection;

use aph_core::{Error, ItemId, JobId, Result};

use crate::models::HistoryEntry;

const COLS: &str = "id, job_id, item_id, operation, detail, created_at";

/// Record an operation.
pub fn record(
    conn: &Connection,
    job_id: Option<JobId>,
    item_id: Option<&ItemId>,
    operation: &str,
    detail: Option<&str>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO job_history (job_id, item_id, operation, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            job_id.map(|j| j.to_string()),
            item_id.map(ItemId::as_str),
            operation,
            detail,
            &now,
        ],
    )
    .map_err(|e| Error::database(e))?;
    Ok(())
}

/// Most recent entries, newest first.
pub fn list_recent(conn: &Connection, limit: i64) -> Result<Vec<HistoryEntry>> {
    let q = format!("SELECT {COLS} FROM job_history ORDER BY id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([limit], HistoryEntry::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}
