//! aph-store: local poster storage in three buckets.
//!
//! ```text
//! posters/
//!   original/<item_id>.<ext>
//!   working/<item_id>.<ext>
//!   modified/<item_id>.<ext>
//! ```
//!
//! `original` is the canonical backup for revert: written atomically once,
//! never mutated afterwards. `working` is transient scratch space cleared
//! after each item. `modified` holds the badged output and may be
//! overwritten freely.

mod store;

pub use store::{content_hash, PosterBucket, PosterFile, PosterStore};
