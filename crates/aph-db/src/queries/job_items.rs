//! Per-item result lookups.
//!
//! Rows are written by `jobs::settle_item`; this module only reads them.

use rusqlite::Connection;

use aph_core::{Error, ItemId, JobId, Result};

use crate::models::JobItem;

const COLS: &str = "job_id, item_id, status, error_kind, error_message,
    badges_applied, attempts, duration_ms, finished_at";

/// All results for a job, in settlement order.
pub fn list_for_job(conn: &Connection, job_id: JobId) -> Result<Vec<JobItem>> {
    let q = format!("SELECT {COLS} FROM job_items WHERE job_id = ?1 ORDER BY finished_at ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([job_id.to_string()], JobItem::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// One result for a specific (job, item), if settled.
pub fn get(conn: &Connection, job_id: JobId, item_id: &ItemId) -> Result<Option<JobItem>> {
    let q = format!("SELECT {COLS} FROM job_items WHERE job_id = ?1 AND item_id = ?2");
    match conn.query_row(
        &q,
        rusqlite::params![job_id.to_string(), item_id.as_str()],
        JobItem::from_row,
    ) {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// The most recent successful badging result for an item across all jobs.
///
/// Used by the revert manager to learn which badges were last applied.
pub fn latest_ok_for_item(conn: &Connection, item_id: &ItemId) -> Result<Option<JobItem>> {
    let q = format!(
        "SELECT {COLS} FROM job_items
         WHERE item_id = ?1 AND status = 'ok'
         ORDER BY finished_at DESC LIMIT 1"
    );
    match conn.query_row(&q, [item_id.as_str()], JobItem::from_row) {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}
