//! The job engine: submission, dispatch, progress, cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use aph_badge::{BadgeCatalog, Renderer};
use aph_catalog::CatalogClient;
use aph_core::config::EngineConfig;
use aph_core::events::{ProgressBus, ProgressEvent, ProgressKind};
use aph_core::{BadgeMask, Error, ItemId, JobId, JobProgress, JobStatus, JobType, Result};
use aph_db::models::{Job, JobItem};
use aph_db::{get_conn, queries, DbPool};
use aph_resolve::AttributeResolver;
use aph_store::PosterStore;

use crate::item::{process_badge_item, UnitOutcome};
use crate::queue::{WorkQueue, WorkUnit};
use crate::revert::{restore_item, revert_item};

/// Everything a worker needs, shared across the pool.
pub struct EngineDeps {
    pub pool: DbPool,
    pub store: Arc<PosterStore>,
    pub catalog: Arc<CatalogClient>,
    pub resolver: Arc<AttributeResolver>,
    pub badges: Arc<BadgeCatalog>,
    pub renderer: Arc<Renderer>,
    pub bus: Arc<ProgressBus>,
    pub engine_cfg: EngineConfig,
    pub processed_tag: String,
}

struct JobHandle {
    cancel: CancellationToken,
    seq: Arc<AtomicU64>,
}

/// Single-node job engine with a fixed worker pool.
pub struct JobEngine {
    deps: Arc<EngineDeps>,
    queue: Arc<WorkQueue>,
    handles: DashMap<JobId, JobHandle>,
    inflight: Arc<DashMap<ItemId, JobId>>,
    shutdown: CancellationToken,
}

impl JobEngine {
    /// Start the engine and its worker pool.
    pub fn start(deps: EngineDeps) -> Arc<Self> {
        let workers = deps.engine_cfg.workers.clamp(1, 16);
        let engine = Arc::new(Self {
            deps: Arc::new(deps),
            queue: Arc::new(WorkQueue::new()),
            handles: DashMap::new(),
            inflight: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        });

        for worker in 0..workers {
            let engine = engine.clone();
            tokio::spawn(async move {
                tracing::debug!(worker, "engine worker started");
                engine.worker_loop().await;
                tracing::debug!(worker, "engine worker stopped");
            });
        }
        engine
    }

    /// Stop claiming new work. In-flight units finish their current stage.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a batch badging job.
    pub fn submit_batch(
        &self,
        item_ids: Vec<ItemId>,
        mask: BadgeMask,
        options: serde_json::Value,
    ) -> Result<JobId> {
        self.submit(JobType::Batch, item_ids, mask, options)
    }

    /// Submit a single-item badging job.
    pub fn submit_single(
        &self,
        item_id: ItemId,
        mask: BadgeMask,
        options: serde_json::Value,
    ) -> Result<JobId> {
        self.submit(JobType::Single, vec![item_id], mask, options)
    }

    /// Submit a revert job over the given items.
    pub fn submit_revert(&self, item_ids: Vec<ItemId>) -> Result<JobId> {
        self.submit(
            JobType::Revert,
            item_ids,
            BadgeMask::none(),
            serde_json::json!({}),
        )
    }

    /// Submit a restore-all job covering every stored original.
    pub fn submit_restore_all(&self) -> Result<JobId> {
        let items = self.deps.store.list_originals()?;
        self.submit(
            JobType::RestoreAll,
            items,
            BadgeMask::none(),
            serde_json::json!({}),
        )
    }

    fn submit(
        &self,
        job_type: JobType,
        item_ids: Vec<ItemId>,
        mask: BadgeMask,
        options: serde_json::Value,
    ) -> Result<JobId> {
        let conn = get_conn(&self.deps.pool)?;
        let job = queries::jobs::create_job(&conn, job_type, &item_ids, &mask, &options)?;
        drop(conn);

        let handle = JobHandle {
            cancel: CancellationToken::new(),
            seq: Arc::new(AtomicU64::new(0)),
        };
        let cancel = handle.cancel.clone();
        let seq = handle.seq.clone();
        self.handles.insert(job.id, handle);

        self.publish(job.id, &seq, ProgressKind::JobStatus { status: JobStatus::Queued });
        tracing::info!(job_id = %job.id, job_type = %job_type, items = item_ids.len(), "job submitted");

        if item_ids.is_empty() {
            // Nothing to do: terminal immediately.
            let conn = get_conn(&self.deps.pool)?;
            queries::jobs::mark_running(&conn, job.id)?;
            queries::jobs::finish_job(&conn, job.id, JobStatus::Succeeded, Some("empty job"))?;
            self.publish(
                job.id,
                &seq,
                ProgressKind::JobStatus { status: JobStatus::Succeeded },
            );
            self.handles.remove(&job.id);
            return Ok(job.id);
        }

        self.queue
            .push_job(job.id, job_type, item_ids, mask, cancel, seq);
        Ok(job.id)
    }

    // -----------------------------------------------------------------------
    // Introspection and control
    // -----------------------------------------------------------------------

    /// Fetch a job row.
    pub fn get_job(&self, job_id: JobId) -> Result<Job> {
        let conn = get_conn(&self.deps.pool)?;
        queries::jobs::get_job(&conn, job_id)?
            .ok_or_else(|| Error::CatalogNotFound(format!("job {job_id}")))
    }

    /// List jobs, newest first.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>> {
        let conn = get_conn(&self.deps.pool)?;
        queries::jobs::list_jobs(&conn, status, 0, limit)
    }

    /// Per-item results for a job.
    pub fn job_items(&self, job_id: JobId) -> Result<Vec<JobItem>> {
        let conn = get_conn(&self.deps.pool)?;
        queries::job_items::list_for_job(&conn, job_id)
    }

    /// Request cancellation. Idempotent; returns whether a running job
    /// acknowledged (a queued job just cancels silently).
    pub fn cancel(&self, job_id: JobId) -> Result<bool> {
        let conn = get_conn(&self.deps.pool)?;
        let newly = queries::jobs::request_cancel(&conn, job_id)?;
        let status = queries::jobs::get_job(&conn, job_id)?.map(|j| j.status);
        drop(conn);

        if newly {
            if let Some(handle) = self.handles.get(&job_id) {
                handle.cancel.cancel();
            }
            tracing::info!(job_id = %job_id, "cancellation requested");
        }
        Ok(newly && status == Some(JobStatus::Running))
    }

    /// Stream progress events for a job.
    ///
    /// The stream starts with buffered events, continues live, and ends at
    /// the terminal job-status event. Already-terminal jobs yield a
    /// synthesized terminal event when the buffer has been evicted.
    pub fn stream_progress(&self, job_id: JobId) -> UnboundedReceiverStream<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = self.deps.bus.clone();
        let pool = self.deps.pool.clone();

        /// Forward one event, deduplicating by sequence number. Returns
        /// false when the stream should end (terminal event or receiver
        /// gone).
        fn forward(
            tx: &mpsc::UnboundedSender<ProgressEvent>,
            last_seq: &mut Option<u64>,
            event: ProgressEvent,
        ) -> bool {
            if last_seq.is_some_and(|s| event.seq <= s) {
                return true; // duplicate of a catch-up event
            }
            *last_seq = Some(event.seq);
            let terminal = event.is_terminal();
            if tx.send(event).is_err() {
                return false;
            }
            !terminal
        }

        tokio::spawn(async move {
            let mut live = bus.subscribe();
            let mut last_seq: Option<u64> = None;

            for event in bus.recent_for(job_id) {
                if !forward(&tx, &mut last_seq, event) {
                    return;
                }
            }

            // If the job is already terminal but its terminal event was
            // evicted from the ring buffer, synthesize one.
            let status = get_conn(&pool)
                .ok()
                .and_then(|conn| queries::jobs::get_job(&conn, job_id).ok().flatten())
                .map(|j| j.status);
            if let Some(status) = status {
                if status.is_terminal() {
                    let seq = last_seq.map_or(0, |s| s + 1);
                    let _ = tx.send(ProgressEvent {
                        seq,
                        job_id,
                        kind: ProgressKind::JobStatus { status },
                    });
                    return;
                }
            }

            loop {
                match live.recv().await {
                    Ok(event) => {
                        if event.job_id != job_id {
                            continue;
                        }
                        if !forward(&tx, &mut last_seq, event) {
                            return;
                        }
                    }
                    // A slow consumer that misses events keeps listening;
                    // the terminal event still arrives later.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        UnboundedReceiverStream::new(rx)
    }

    /// Revert one item immediately, outside the job queue.
    pub async fn revert_now(&self, item_id: &ItemId) -> Result<()> {
        let claim = self.claim_item(item_id, JobId::new());
        let Some(_guard) = claim else {
            return Err(Error::Busy(item_id.to_string()));
        };
        revert_item(&self.deps, item_id).await
    }

    /// Restore every stored original over its modified copy, reporting
    /// per-file results.
    pub async fn restore_all(&self) -> Result<Vec<(ItemId, Result<()>)>> {
        let items = self.deps.store.list_originals()?;
        let mut results = Vec::with_capacity(items.len());
        for item_id in items {
            let outcome = restore_item(&self.deps, &item_id).await;
            results.push((item_id, outcome));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Worker pool
    // -----------------------------------------------------------------------

    async fn worker_loop(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let Some(unit) = self.queue.next_unit() else {
                tokio::select! {
                    _ = self.queue.wait() => {}
                    _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                    _ = self.shutdown.cancelled() => break,
                }
                continue;
            };
            self.run_unit(unit).await;
        }
    }

    async fn run_unit(&self, unit: WorkUnit) {
        if unit.first_claim {
            match get_conn(&self.deps.pool)
                .and_then(|conn| queries::jobs::mark_running(&conn, unit.job_id))
            {
                Ok(true) => self.publish(
                    unit.job_id,
                    &unit.seq,
                    ProgressKind::JobStatus { status: JobStatus::Running },
                ),
                Ok(false) => {}
                Err(e) => tracing::error!(job_id = %unit.job_id, error = %e, "mark running failed"),
            }
        }

        self.publish(
            unit.job_id,
            &unit.seq,
            ProgressKind::ItemStarted {
                item_id: unit.item_id.clone(),
            },
        );

        let started = Instant::now();
        let outcome = self.execute_unit(&unit).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.publish(
            unit.job_id,
            &unit.seq,
            ProgressKind::ItemFinished {
                item_id: unit.item_id.clone(),
                status: outcome.status,
                error_kind: outcome.error_kind,
            },
        );

        // Persist the item result before any dependent side effect is
        // visible to observers of the job row.
        let settle = get_conn(&self.deps.pool).and_then(|conn| {
            queries::jobs::settle_item(
                &conn,
                unit.job_id,
                &queries::jobs::NewItemResult {
                    item_id: &unit.item_id,
                    status: outcome.status,
                    error_kind: outcome.error_kind,
                    error_message: outcome.error_message.as_deref(),
                    badges_applied: &outcome.badges_applied,
                    attempts: outcome.attempts.max(1),
                    duration_ms,
                },
            )
        });
        if let Err(e) = settle {
            // Storage for job state is gone: the batch as a whole fails.
            tracing::error!(job_id = %unit.job_id, item = %unit.item_id, error = %e, "failed to settle item");
            let _ = get_conn(&self.deps.pool).and_then(|conn| {
                queries::jobs::finish_job(
                    &conn,
                    unit.job_id,
                    JobStatus::Failed,
                    Some("job state storage failure"),
                )
            });
        }

        if self.queue.complete_unit(unit.job_id) {
            self.finalize(unit.job_id, &unit.seq).await;
        }
    }

    async fn execute_unit(&self, unit: &WorkUnit) -> UnitOutcome {
        if unit.cancel.is_cancelled() {
            return UnitOutcome::skipped_cancelled(0);
        }

        let Some(_guard) = self.claim_item(&unit.item_id, unit.job_id) else {
            return UnitOutcome::busy();
        };

        match unit.job_type {
            JobType::Single | JobType::Batch => {
                process_badge_item(&self.deps, &unit.item_id, &unit.mask, &unit.cancel).await
            }
            JobType::Revert => match revert_item(&self.deps, &unit.item_id).await {
                Ok(()) => UnitOutcome::ok(Vec::new(), 1),
                Err(e) => UnitOutcome::failed(&e, 1),
            },
            JobType::RestoreAll => match restore_item(&self.deps, &unit.item_id).await {
                Ok(()) => UnitOutcome::ok(Vec::new(), 1),
                Err(e) => UnitOutcome::failed(&e, 1),
            },
        }
    }

    async fn finalize(&self, job_id: JobId, seq: &Arc<AtomicU64>) {
        let job = match get_conn(&self.deps.pool)
            .and_then(|conn| queries::jobs::get_job(&conn, job_id))
        {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "finalize read failed");
                return;
            }
        };
        if job.status.is_terminal() {
            // A settle failure already finalized this job as failed.
            self.handles.remove(&job_id);
            return;
        }

        let status = final_status(&job.progress, job.cancel_requested);
        let summary = format!(
            "ok={} failed={} skipped={}",
            job.progress.done, job.progress.failed, job.progress.skipped
        );

        let result = get_conn(&self.deps.pool).and_then(|conn| {
            queries::jobs::finish_job(&conn, job_id, status, Some(&summary))?;
            queries::job_history::record(
                &conn,
                Some(job_id),
                None,
                "job_finished",
                Some(&summary),
            )
        });
        if let Err(e) = result {
            tracing::error!(job_id = %job_id, error = %e, "finalize write failed");
        }

        self.publish(job_id, seq, ProgressKind::JobStatus { status });
        self.handles.remove(&job_id);
        tracing::info!(job_id = %job_id, status = %status, %summary, "job finished");
    }

    fn publish(&self, job_id: JobId, seq: &Arc<AtomicU64>, kind: ProgressKind) {
        let seq = seq.fetch_add(1, Ordering::SeqCst);
        self.deps.bus.publish(ProgressEvent { seq, job_id, kind });
    }

    /// Claim exclusive processing rights for an item.
    fn claim_item(&self, item_id: &ItemId, job_id: JobId) -> Option<InflightGuard> {
        use dashmap::mapref::entry::Entry;
        match self.inflight.entry(item_id.clone()) {
            Entry::Occupied(held) => {
                tracing::debug!(item = %item_id, holder = %held.get(), "item busy");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(job_id);
                Some(InflightGuard {
                    map: self.inflight.clone(),
                    item_id: item_id.clone(),
                })
            }
        }
    }
}

/// Releases the in-flight claim on drop.
struct InflightGuard {
    map: Arc<DashMap<ItemId, JobId>>,
    item_id: ItemId,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.item_id);
    }
}

/// Compute a job's terminal status from its settled counters.
///
/// Cancellation wins when nothing completed; any completed work under
/// cancellation (or any failure/skip otherwise) is `partial`.
fn final_status(progress: &JobProgress, cancel_requested: bool) -> JobStatus {
    if cancel_requested {
        if progress.done == 0 {
            return JobStatus::Cancelled;
        }
        return JobStatus::Partial;
    }
    if progress.done == progress.total {
        JobStatus::Succeeded
    } else {
        JobStatus::Partial
    }
}
