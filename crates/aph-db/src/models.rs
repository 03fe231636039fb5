//! Row types read back from the database.
//!
//! Enums and JSON blobs persist as text, so every model carries a
//! `from_row` that decodes those columns; the SQL in `queries/` always
//! selects columns in the order the decoder expects.

use uuid::Uuid;

use aph_core::{
    BadgeMask, BadgeType, ErrorKind, ItemId, ItemStatus, JobId, JobProgress, JobStatus, JobType,
    ScheduleId,
};

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Decode a UUID text column into a typed ID.
///
/// A malformed UUID means the row was corrupted outside this process;
/// the column index is kept in the error so the broken column is
/// identifiable from the log line alone.
fn uuid_column<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    match Uuid::parse_str(&raw) {
        Ok(uuid) => Ok(uuid.into()),
        Err(e) => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )),
    }
}

/// Parse a lowercase enum stored as text via its serde representation.
fn parse_enum<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(s)).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Serialize an enum to the lowercase text form stored in the database.
pub(crate) fn enum_to_text<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A row in `jobs`.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub item_ids: Vec<ItemId>,
    pub badge_mask: BadgeMask,
    pub options: serde_json::Value,
    pub progress: JobProgress,
    pub cancel_requested: bool,
    pub result_summary: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Job {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let item_ids_json: String = row.get(3)?;
        let badge_mask_json: String = row.get(4)?;
        let options_json: String = row.get(5)?;
        Ok(Self {
            id: uuid_column(row, 0)?,
            job_type: parse_enum(row, 1)?,
            status: parse_enum(row, 2)?,
            item_ids: serde_json::from_str(&item_ids_json).unwrap_or_default(),
            badge_mask: serde_json::from_str(&badge_mask_json).unwrap_or_else(|_| BadgeMask::all()),
            options: serde_json::from_str(&options_json)
                .unwrap_or(serde_json::Value::Object(Default::default())),
            progress: JobProgress {
                total: row.get::<_, i64>(6)? as u32,
                done: row.get::<_, i64>(7)? as u32,
                failed: row.get::<_, i64>(8)? as u32,
                skipped: row.get::<_, i64>(9)? as u32,
            },
            cancel_requested: row.get::<_, i64>(10)? != 0,
            result_summary: row.get(11)?,
            created_at: row.get(12)?,
            started_at: row.get(13)?,
            finished_at: row.get(14)?,
        })
    }
}

// ---------------------------------------------------------------------------
// JobItem
// ---------------------------------------------------------------------------

/// A row in `job_items`: one terminal result per (job, item).
#[derive(Debug, Clone)]
pub struct JobItem {
    pub job_id: JobId,
    pub item_id: ItemId,
    pub status: ItemStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub badges_applied: Vec<BadgeType>,
    pub attempts: u32,
    pub duration_ms: u64,
    pub finished_at: String,
}

impl JobItem {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let error_kind: Option<String> = row.get(3)?;
        let badges_json: String = row.get(5)?;
        Ok(Self {
            job_id: uuid_column(row, 0)?,
            item_id: ItemId::new(row.get::<_, String>(1)?),
            status: parse_enum(row, 2)?,
            error_kind: error_kind.as_deref().and_then(ErrorKind::parse),
            error_message: row.get(4)?,
            badges_applied: serde_json::from_str(&badges_json).unwrap_or_default(),
            attempts: row.get::<_, i64>(6)? as u32,
            duration_ms: row.get::<_, i64>(7)? as u64,
            finished_at: row.get(8)?,
        })
    }
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// A row in `job_history`.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub job_id: Option<JobId>,
    pub item_id: Option<ItemId>,
    pub operation: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl HistoryEntry {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let job_id: Option<String> = row.get(1)?;
        let item_id: Option<String> = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            job_id: job_id.and_then(|s| s.parse().ok()),
            item_id: item_id.map(ItemId::new),
            operation: row.get(3)?,
            detail: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

/// A row in `source_cache`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub source: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub fetched_at: String,
    pub expires_at: String,
}

impl CacheEntry {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let payload_json: String = row.get(2)?;
        Ok(Self {
            source: row.get(0)?,
            key: row.get(1)?,
            payload: serde_json::from_str(&payload_json).unwrap_or(serde_json::Value::Null),
            fetched_at: row.get(3)?,
            expires_at: row.get(4)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ReviewSourceRow
// ---------------------------------------------------------------------------

/// A row in `review_sources`.
#[derive(Debug, Clone)]
pub struct ReviewSourceRow {
    pub name: String,
    pub enabled: bool,
    pub priority: i64,
    pub conditions: serde_json::Value,
}

impl ReviewSourceRow {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let conditions_json: String = row.get(3)?;
        Ok(Self {
            name: row.get(0)?,
            enabled: row.get::<_, i64>(1)? != 0,
            priority: row.get(2)?,
            conditions: serde_json::from_str(&conditions_json)
                .unwrap_or(serde_json::Value::Object(Default::default())),
        })
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A row in `schedules`.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub cron: String,
    pub enabled: bool,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
    pub created_at: String,
}

impl Schedule {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            cron: row.get(2)?,
            enabled: row.get::<_, i64>(3)? != 0,
            last_run_at: row.get(4)?,
            next_run_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_to_text_lowercase() {
        assert_eq!(enum_to_text(&JobStatus::Queued), "queued");
        assert_eq!(enum_to_text(&JobType::RestoreAll), "restore_all");
        assert_eq!(enum_to_text(&ItemStatus::Ok), "ok");
        assert_eq!(enum_to_text(&ErrorKind::CatalogRateLimited), "catalog_rate_limited");
    }
}
