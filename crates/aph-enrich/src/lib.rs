//! aph-enrich: external rating and awards sources.
//!
//! Each source implements [`EnrichmentSource`]; the resolver iterates a
//! registered set ordered by configured priority, so new sources are
//! additive. All HTTP sources share the same discipline: per-source token
//! bucket, finite deadlines, `Retry-After` surfacing, and a read-through
//! response cache keyed by `(source, logical_key)`.

mod anidb;
mod awards;
mod cache;
mod http;
mod mal;
mod mdblist;
mod omdb;
mod source;
mod title;
mod tmdb;

pub use anidb::AniDbClient;
pub use awards::{AwardEntry, AwardsDataset};
pub use cache::CachedSource;
pub use http::SourceHttp;
pub use mal::{MalClient, MalMapping};
pub use mdblist::MdblistClient;
pub use omdb::OmdbClient;
pub use source::{EnrichmentSource, LookupHints, SourceRegistry, SourceResult};
pub use title::{clean_title, title_variants};
pub use tmdb::{PosterCandidate, TmdbClient};
