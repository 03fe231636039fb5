//! The per-item badging pipeline.
//!
//! Stages run in strict order with a cancellation checkpoint between each:
//! fetch → resolve → select → render → upload → tag. The whole unit runs
//! under one deadline; transient failures retry with full-jitter backoff,
//! and a server `Retry-After` that fits inside the remaining deadline is
//! honored without spending an attempt.

use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

use aph_core::{BadgeType, Error, ErrorKind, ItemId, ItemStatus, Result};
use aph_store::PosterBucket;

use crate::engine::EngineDeps;
use crate::retry::backoff_delay;

/// Terminal outcome of one work unit.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub status: ItemStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub badges_applied: Vec<BadgeType>,
    pub attempts: u32,
}

impl UnitOutcome {
    pub(crate) fn ok(badges_applied: Vec<BadgeType>, attempts: u32) -> Self {
        Self {
            status: ItemStatus::Ok,
            error_kind: None,
            error_message: None,
            badges_applied,
            attempts,
        }
    }

    pub(crate) fn failed(err: &Error, attempts: u32) -> Self {
        Self {
            status: ItemStatus::Failed,
            error_kind: Some(err.kind()),
            error_message: Some(err.to_string()),
            badges_applied: Vec::new(),
            attempts,
        }
    }

    pub(crate) fn skipped_cancelled(attempts: u32) -> Self {
        Self {
            status: ItemStatus::Skipped,
            error_kind: Some(ErrorKind::Cancelled),
            error_message: None,
            badges_applied: Vec::new(),
            attempts,
        }
    }

    pub(crate) fn busy() -> Self {
        Self {
            status: ItemStatus::Failed,
            error_kind: Some(ErrorKind::Busy),
            error_message: Some("item is being processed by another job".into()),
            badges_applied: Vec::new(),
            attempts: 0,
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Run the badging pipeline for one item with retries and a deadline.
pub(crate) async fn process_badge_item(
    deps: &EngineDeps,
    item_id: &ItemId,
    mask: &aph_core::BadgeMask,
    cancel: &CancellationToken,
) -> UnitOutcome {
    let deadline = Instant::now() + Duration::from_secs(deps.engine_cfg.item_timeout_secs);
    let max_attempts = deps.engine_cfg.max_attempts.max(1);
    let cap = Duration::from_secs(deps.engine_cfg.backoff_cap_secs);
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return UnitOutcome::skipped_cancelled(attempts);
        }
        attempts += 1;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let err = Error::Timeout(format!("item {item_id} deadline elapsed"));
            return UnitOutcome::failed(&err, attempts);
        }

        match timeout(remaining, badge_attempt(deps, item_id, mask, cancel)).await {
            Err(_) => {
                let err = Error::Timeout(format!("item {item_id} deadline elapsed"));
                return UnitOutcome::failed(&err, attempts);
            }
            Ok(Ok(applied)) => return UnitOutcome::ok(applied, attempts),
            Ok(Err(Error::Cancelled)) => return UnitOutcome::skipped_cancelled(attempts),
            Ok(Err(err)) => {
                // A rate-limit wait that fits inside the deadline does not
                // consume an attempt.
                if let Some(wait) = err.retry_after() {
                    if Instant::now() + wait <= deadline {
                        tracing::debug!(item = %item_id, ?wait, "honoring retry-after");
                        sleep(wait).await;
                        attempts -= 1;
                        continue;
                    }
                }

                if err.is_retryable() && attempts < max_attempts {
                    let delay = backoff_delay(attempts, cap);
                    if Instant::now() + delay >= deadline {
                        return UnitOutcome::failed(&err, attempts);
                    }
                    tracing::debug!(
                        item = %item_id,
                        attempt = attempts,
                        ?delay,
                        error = %err,
                        "retrying item"
                    );
                    sleep(delay).await;
                    continue;
                }

                return UnitOutcome::failed(&err, attempts);
            }
        }
    }
}

/// One attempt at the full per-item pipeline.
async fn badge_attempt(
    deps: &EngineDeps,
    item_id: &ItemId,
    mask: &aph_core::BadgeMask,
    cancel: &CancellationToken,
) -> Result<Vec<BadgeType>> {
    // Fetch metadata.
    checkpoint(cancel)?;
    let meta = deps.catalog.get_item(item_id).await?;

    // Fetch the poster; a retry never re-downloads when an original is
    // already on disk.
    checkpoint(cancel)?;
    let original = if deps.store.exists(item_id, PosterBucket::Original) {
        deps.store.read(item_id, PosterBucket::Original)?
    } else {
        let image = deps.catalog.get_primary_image(item_id).await?;
        deps.store.save_original(item_id, &image.bytes)?;
        image.bytes
    };

    // Resolve attributes.
    checkpoint(cancel)?;
    let attrs = deps.resolver.resolve(&meta).await?;

    // Select badges.
    let selection = deps.badges.select(&attrs, mask);
    for (badge_type, reason) in &selection.skipped {
        tracing::debug!(item = %item_id, badge = %badge_type, reason, "badge not selectable");
    }

    // Render.
    checkpoint(cancel)?;
    let outcome = deps.renderer.render(&original, &selection.instances)?;

    if outcome.applied.is_empty() {
        // Nothing applicable: succeed without touching the catalog. The
        // processed tag marks badged posters only (unless configured
        // otherwise).
        deps.store.clear_working(item_id);
        if deps.engine_cfg.tag_on_zero_badges {
            deps.catalog.add_tag(item_id, &deps.processed_tag).await?;
        }
        return Ok(Vec::new());
    }

    // Upload, then tag, then persist the modified copy. The working file
    // bounds the window where catalog and disk disagree.
    deps.store.write_working(item_id, &outcome.bytes)?;
    checkpoint(cancel)?;
    deps.catalog
        .put_primary_image(item_id, &outcome.bytes, &outcome.mime)
        .await?;
    deps.catalog.add_tag(item_id, &deps.processed_tag).await?;
    deps.store.save_modified(item_id, &outcome.bytes)?;
    deps.store.clear_working(item_id);

    Ok(outcome.applied)
}
