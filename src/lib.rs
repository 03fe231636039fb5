//! aphrodite: poster badging for Jellyfin-class media servers.
//!
//! This crate wires the member crates into an [`AppContext`] and exposes
//! the control surface used by the CLI and other callers: job submission,
//! progress streaming, revert/restore, and configuration access.

pub mod context;
pub mod posters;

pub use context::AppContext;
pub use posters::PosterOps;

// Re-export the crates callers interact with.
pub use aph_badge as badge;
pub use aph_catalog as catalog;
pub use aph_core as core;
pub use aph_db as db;
pub use aph_engine as engine;
pub use aph_enrich as enrich;
pub use aph_resolve as resolve;
pub use aph_store as store;
