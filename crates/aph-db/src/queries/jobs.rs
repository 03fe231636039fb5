//! Job table operations.
//!
//! Status changes are compare-and-set: every UPDATE names the status it
//! expects to leave, so concurrent workers cannot move a job backwards or
//! double-settle an item.

use chrono::Utc;
use rusqlite::Connection;

use aph_core::{
    BadgeMask, BadgeType, Error, ErrorKind, ItemId, ItemStatus, JobId, JobStatus, JobType, Result,
};

use crate::models::{enum_to_text, Job};

const COLS: &str = "id, job_type, status, item_ids, badge_mask, options,
    progress_total, progress_done, progress_failed, progress_skipped,
    cancel_requested, result_summary, created_at, started_at, finished_at";

/// Create a new queued job.
pub fn create_job(
    conn: &Connection,
    job_type: JobType,
    item_ids: &[ItemId],
    badge_mask: &BadgeMask,
    options: &serde_json::Value,
) -> Result<Job> {
    let id = JobId::new();
    let now = Utc::now().to_rfc3339();
    let item_ids_json = serde_json::to_string(item_ids).map_err(|e| Error::database(e))?;
    let badge_mask_json = serde_json::to_string(badge_mask).map_err(|e| Error::database(e))?;

    conn.execute(
        "INSERT INTO jobs (id, job_type, status, item_ids, badge_mask, options,
             progress_total, created_at)
         VALUES (?1, ?2, 'queued', ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id.to_string(),
            enum_to_text(&job_type),
            item_ids_json,
            badge_mask_json,
            options.to_string(),
            item_ids.len() as i64,
            &now,
        ],
    )
    .map_err(|e| Error::database(e))?;

    get_job(conn, id)?.ok_or_else(|| Error::database("job vanished after insert"))
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], Job::from_row) {
        Ok(j) => Ok(Some(j)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// List jobs with an optional status filter, newest first.
///
/// The filtered and unfiltered shapes are separate queries; two branches
/// of static SQL beat one dynamically assembled parameter list.
pub fn list_jobs(
    conn: &Connection,
    status: Option<JobStatus>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Job>> {
    match status {
        Some(status) => {
            let q = format!(
                "SELECT {COLS} FROM jobs WHERE status = ?1
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![enum_to_text(&status), limit, offset],
                    Job::from_row,
                )
                .map_err(|e| Error::database(e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e))?;
            Ok(rows)
        }
        None => {
            let q = format!("SELECT {COLS} FROM jobs ORDER BY created_at DESC LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], Job::from_row)
                .map_err(|e| Error::database(e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e))?;
            Ok(rows)
        }
    }
}

/// Oldest queued jobs first (submission-order FIFO for the dispatcher).
pub fn list_queued(conn: &Connection, limit: i64) -> Result<Vec<Job>> {
    let q = format!(
        "SELECT {COLS} FROM jobs WHERE status = 'queued'
         ORDER BY created_at ASC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([limit], Job::from_row)
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;
    Ok(rows)
}

/// Move a queued job to running. Returns false if the job was not queued
/// (already claimed, cancelled, or unknown).
pub fn mark_running(conn: &Connection, id: JobId) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'running', started_at = ?1
             WHERE id = ?2 AND status = 'queued'",
            rusqlite::params![&now, id.to_string()],
        )
        .map_err(|e| Error::database(e))?;
    Ok(n > 0)
}

/// Move a running (or still-queued, for cancellation) job to a terminal
/// status. Returns false if the job was already terminal.
pub fn finish_job(
    conn: &Connection,
    id: JobId,
    status: JobStatus,
    summary: Option<&str>,
) -> Result<bool> {
    debug_assert!(status.is_terminal());
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = ?1, result_summary = ?2, finished_at = ?3
             WHERE id = ?4 AND status IN ('queued', 'running')",
            rusqlite::params![enum_to_text(&status), summary, &now, id.to_string()],
        )
        .map_err(|e| Error::database(e))?;
    Ok(n > 0)
}

/// Request cancellation. Idempotent; returns true if the flag was newly set
/// on a non-terminal job.
pub fn request_cancel(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET cancel_requested = 1
             WHERE id = ?1 AND cancel_requested = 0 AND status IN ('queued', 'running')",
            [id.to_string()],
        )
        .map_err(|e| Error::database(e))?;
    Ok(n > 0)
}

/// Whether cancellation has been requested for a job.
pub fn cancel_requested(conn: &Connection, id: JobId) -> Result<bool> {
    match conn.query_row(
        "SELECT cancel_requested FROM jobs WHERE id = ?1",
        [id.to_string()],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(v) => Ok(v != 0),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(Error::database(e)),
    }
}

/// Terminal result of one work unit, ready to persist.
#[derive(Debug, Clone)]
pub struct NewItemResult<'a> {
    pub item_id: &'a ItemId,
    pub status: ItemStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<&'a str>,
    pub badges_applied: &'a [BadgeType],
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Record an item result and bump the matching progress counter in one
/// transaction. The UPDATE is guarded on `status = 'running'` so a settled
/// item can never mutate a terminal job.
pub fn settle_item(conn: &Connection, job_id: JobId, result: &NewItemResult<'_>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let badges_json =
        serde_json::to_string(result.badges_applied).map_err(|e| Error::database(e))?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e))?;

    tx.execute(
        "INSERT INTO job_items (job_id, item_id, status, error_kind, error_message,
             badges_applied, attempts, duration_ms, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            job_id.to_string(),
            result.item_id.as_str(),
            enum_to_text(&result.status),
            result.error_kind.map(|k| k.as_str()),
            result.error_message,
            badges_json,
            result.attempts as i64,
            result.duration_ms as i64,
            &now,
        ],
    )
    .map_err(|e| Error::database(e))?;

    let counter = match result.status {
        ItemStatus::Ok => "progress_done",
        ItemStatus::Failed => "progress_failed",
        ItemStatus::Skipped => "progress_skipped",
    };
    let n = tx
        .execute(
            &format!(
                "UPDATE jobs SET {counter} = {counter} + 1
                 WHERE id = ?1 AND status = 'running'"
            ),
            [job_id.to_string()],
        )
        .map_err(|e| Error::database(e))?;
    if n == 0 {
        return Err(Error::Database(format!(
            "job {job_id} is not running; cannot settle item {}",
            result.item_id
        )));
    }

    tx.commit().map_err(|e| Error::database(e))?;
    Ok(())
}
