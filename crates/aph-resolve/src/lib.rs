//! aph-resolve: from catalog metadata and enrichment results to a single
//! typed [`aph_core::ItemAttributes`] record per item.
//!
//! Detection is layered: stream metadata first, filename tokens as
//! cross-validation, enrichment sources for reviews and awards, and a
//! dominant-value election for series.

mod audio;
mod filename;
mod resolution;
mod resolver;
mod series;

pub use audio::detect_audio;
pub use filename::{scan_filename, FilenameSignals};
pub use resolution::{classify_dimensions, detect_resolution, ResolutionDetection};
pub use resolver::{AttributeResolver, ResolverOptions, ReviewPriority};
pub use series::{elect_series, sample_indices, EpisodeSample, SeriesElection};
