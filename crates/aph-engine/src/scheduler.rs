//! Scheduler hook.
//!
//! External cron-like triggers land here: a due schedule is expanded into a
//! batch submission over its target libraries, the execution is recorded in
//! history, and the schedule's run markers advance. Cancellation and retry
//! semantics are the engine's; the hook adds none of its own.

use std::sync::Arc;

use aph_catalog::CatalogClient;
use aph_core::{BadgeMask, BadgeType, Error, ItemId, JobId, Result, ScheduleId};
use aph_db::{get_conn, queries, DbPool};

use crate::engine::JobEngine;

/// Bridges stored schedules into job submissions.
pub struct SchedulerHook {
    engine: Arc<JobEngine>,
    catalog: Arc<CatalogClient>,
    pool: DbPool,
}

impl SchedulerHook {
    pub fn new(engine: Arc<JobEngine>, catalog: Arc<CatalogClient>, pool: DbPool) -> Self {
        Self {
            engine,
            catalog,
            pool,
        }
    }

    /// Fire one due schedule: enumerate items of its target libraries,
    /// submit a batch, record history, and advance the run markers.
    ///
    /// `next_run_at` is supplied by the caller (cron evaluation lives
    /// outside the core).
    pub async fn run_due(
        &self,
        schedule_id: ScheduleId,
        next_run_at: Option<&str>,
    ) -> Result<JobId> {
        let (schedule, options, targets) = {
            let conn = get_conn(&self.pool)?;
            let schedule = queries::schedules::get(&conn, schedule_id)?
                .ok_or_else(|| Error::ConfigMissing(format!("schedule {schedule_id}")))?;
            let options = queries::schedules::options(&conn, schedule_id)?;
            let targets = queries::schedules::targets(&conn, schedule_id)?;
            (schedule, options, targets)
        };

        if !schedule.enabled {
            return Err(Error::ConfigInvalid(format!(
                "schedule '{}' is disabled",
                schedule.name
            )));
        }

        let mask = options
            .get("badge_types")
            .and_then(|raw| serde_json::from_str::<Vec<BadgeType>>(raw).ok())
            .map(BadgeMask::of)
            .unwrap_or_default();

        // Enumerate all items under every target library, restartable
        // paging per library.
        let mut item_ids: Vec<ItemId> = Vec::new();
        for library_id in &targets {
            let mut cursor = Some(0u32);
            while let Some(start_index) = cursor {
                let page = self.catalog.list_items_page(library_id, start_index).await?;
                cursor = page.next_cursor();
                item_ids.extend(page.items.iter().map(|i| i.item_id()));
            }
        }

        let job_id = self.engine.submit_batch(
            item_ids,
            mask,
            serde_json::json!({ "schedule": schedule.name }),
        )?;

        let conn = get_conn(&self.pool)?;
        queries::schedules::mark_run(&conn, schedule_id, next_run_at)?;
        queries::job_history::record(
            &conn,
            Some(job_id),
            None,
            "schedule_fire",
            Some(&schedule.name),
        )?;

        tracing::info!(
            schedule = %schedule.name,
            job_id = %job_id,
            "schedule fired"
        );
        Ok(job_id)
    }
}
