//! aph-core: shared types, IDs, errors, configuration, and the progress bus.
//!
//! This crate is the foundational dependency for all other aph-* crates,
//! providing type-safe identifiers, a unified error type with stable
//! machine-readable kinds, media-domain enums, resolved item attributes,
//! application configuration, and a broadcast progress-event bus.

pub mod attributes;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;
pub mod media;
pub mod settings;

// Re-export the most commonly used items at the crate root.
pub use attributes::{ItemAttributes, Provenance, Review};
pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use job::*;
pub use media::*;
