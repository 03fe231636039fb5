//! Revert and restore operations.
//!
//! Revert undoes badging for one item: the stored original is uploaded
//! back, the modified copy deleted, and the processed tag removed. Tag and
//! file state converge; the inconsistency window is bounded by the single
//! upload call.

use aph_core::{Error, ItemId, Result};
use aph_db::{get_conn, queries};
use aph_store::PosterBucket;

use crate::engine::EngineDeps;

/// Revert one item to its original poster.
///
/// Preconditions: a stored `original` and the processed tag on the catalog
/// item. Anything else is `cannot_revert`.
pub(crate) async fn revert_item(deps: &EngineDeps, item_id: &ItemId) -> Result<()> {
    if !deps.store.exists(item_id, PosterBucket::Original) {
        return Err(Error::CannotRevert(format!(
            "no original poster stored for {item_id}"
        )));
    }
    let meta = deps.catalog.get_item(item_id).await?;
    if !meta.has_tag(&deps.processed_tag) {
        return Err(Error::CannotRevert(format!(
            "item {item_id} does not carry the processed tag"
        )));
    }

    let bytes = deps.store.read(item_id, PosterBucket::Original)?;
    let mime = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    };

    deps.catalog.put_primary_image(item_id, &bytes, mime).await?;
    deps.store.delete_modified(item_id)?;
    deps.catalog.remove_tag(item_id, &deps.processed_tag).await?;

    let conn = get_conn(&deps.pool)?;
    queries::job_history::record(&conn, None, Some(item_id), "revert", None)?;

    tracing::info!(item = %item_id, "poster reverted to original");
    Ok(())
}

/// Restore one item locally: copy the original over the modified bucket
/// and remove the tag best-effort. Used by restore-all jobs.
pub(crate) async fn restore_item(deps: &EngineDeps, item_id: &ItemId) -> Result<()> {
    let bytes = deps.store.read(item_id, PosterBucket::Original)?;
    deps.store.save_modified(item_id, &bytes)?;

    // Tag removal is best-effort: a local restore must not fail because
    // the catalog is down.
    if let Err(e) = deps.catalog.remove_tag(item_id, &deps.processed_tag).await {
        tracing::warn!(item = %item_id, error = %e, "tag removal failed during restore");
    }

    let conn = get_conn(&deps.pool)?;
    queries::job_history::record(&conn, None, Some(item_id), "restore", None)?;
    Ok(())
}
