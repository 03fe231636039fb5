//! aph-catalog: HTTP client for the upstream media catalog (Jellyfin API).
//!
//! Provides library/item enumeration with restartable paging, item metadata
//! with media streams, primary-image download/upload, and set-membership tag
//! operations. All calls are rate-limited by a process-global token bucket
//! and carry finite deadlines.

mod client;
mod types;

pub use client::CatalogClient;
pub use types::{
    CatalogItem, ImageBytes, ItemPage, Library, MediaStream, ProviderIds, StreamKind,
};
