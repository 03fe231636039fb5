//! Unified error type for the aphrodite application.
//!
//! All crates funnel their failures into [`Error`]. Every error maps to a
//! stable [`ErrorKind`] identifier that is persisted in per-item results and
//! used by the job engine to decide retryability.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error classification.
///
/// The `Display` form of each kind (e.g. `catalog_rate_limited`) is the
/// identifier stored in `job_items.error_kind` and reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigMissing,
    ConfigInvalid,
    CatalogUnreachable,
    CatalogUnauthorized,
    CatalogNotFound,
    CatalogRateLimited,
    CatalogInvalidResponse,
    ImageFetchFailed,
    ImageInvalid,
    ImageTooLarge,
    SourceUnreachable,
    SourceRateLimited,
    SourceNotFound,
    SourceInvalidResponse,
    RenderFontMissing,
    RenderAssetMissing,
    RenderFailed,
    StorageIo,
    StorageConflict,
    Busy,
    Timeout,
    Cancelled,
    CannotRevert,
    UnknownSymbol,
    Internal,
}

impl ErrorKind {
    /// The stable string identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::ConfigInvalid => "config_invalid",
            Self::CatalogUnreachable => "catalog_unreachable",
            Self::CatalogUnauthorized => "catalog_unauthorized",
            Self::CatalogNotFound => "catalog_not_found",
            Self::CatalogRateLimited => "catalog_rate_limited",
            Self::CatalogInvalidResponse => "catalog_invalid_response",
            Self::ImageFetchFailed => "image_fetch_failed",
            Self::ImageInvalid => "image_invalid",
            Self::ImageTooLarge => "image_too_large",
            Self::SourceUnreachable => "source_unreachable",
            Self::SourceRateLimited => "source_rate_limited",
            Self::SourceNotFound => "source_not_found",
            Self::SourceInvalidResponse => "source_invalid_response",
            Self::RenderFontMissing => "render_font_missing",
            Self::RenderAssetMissing => "render_asset_missing",
            Self::RenderFailed => "render_failed",
            Self::StorageIo => "storage_io",
            Self::StorageConflict => "storage_conflict",
            Self::Busy => "busy",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::CannotRevert => "cannot_revert",
            Self::UnknownSymbol => "unknown_symbol",
            Self::Internal => "internal",
        }
    }

    /// Whether failures of this kind are worth retrying.
    ///
    /// Transient network trouble and rate limiting are retryable; everything
    /// that would fail identically on a second attempt is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnreachable
                | Self::CatalogRateLimited
                | Self::SourceUnreachable
                | Self::SourceRateLimited
                | Self::ImageFetchFailed
                | Self::Timeout
        )
    }

    /// Parse a stable identifier back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type covering all failure modes in aphrodite.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required configuration value is absent.
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The catalog server could not be reached.
    #[error("catalog unreachable: {0}")]
    CatalogUnreachable(String),

    /// The catalog rejected our credentials.
    #[error("catalog unauthorized: {0}")]
    CatalogUnauthorized(String),

    /// The catalog does not know the requested entity.
    #[error("catalog entity not found: {0}")]
    CatalogNotFound(String),

    /// The catalog asked us to back off.
    #[error("catalog rate limited")]
    CatalogRateLimited {
        /// Server-provided wait hint, if any.
        retry_after: Option<Duration>,
    },

    /// The catalog answered with something we could not interpret.
    #[error("catalog invalid response: {0}")]
    CatalogInvalidResponse(String),

    /// Downloading poster bytes failed.
    #[error("image fetch failed: {0}")]
    ImageFetchFailed(String),

    /// Image bytes could not be decoded.
    #[error("invalid image data: {0}")]
    ImageInvalid(String),

    /// Image exceeds the configured size ceiling.
    #[error("image too large: {0}")]
    ImageTooLarge(String),

    /// An enrichment source could not be reached.
    #[error("source {source_name} unreachable: {message}")]
    SourceUnreachable {
        /// Name of the enrichment source.
        source_name: String,
        /// Human-readable description.
        message: String,
    },

    /// An enrichment source asked us to back off.
    #[error("source {source_name} rate limited")]
    SourceRateLimited {
        /// Name of the enrichment source.
        source_name: String,
        /// Server-provided wait hint, if any.
        retry_after: Option<Duration>,
    },

    /// An enrichment source has no data for the item.
    #[error("source {source_name}: not found")]
    SourceNotFound {
        /// Name of the enrichment source.
        source_name: String,
    },

    /// An enrichment source answered with something unusable.
    #[error("source {source_name} invalid response: {message}")]
    SourceInvalidResponse {
        /// Name of the enrichment source.
        source_name: String,
        /// Human-readable description.
        message: String,
    },

    /// No usable font could be located.
    #[error("font missing: {0}")]
    RenderFontMissing(String),

    /// A badge image asset is absent from the asset directory.
    #[error("badge asset missing: {0}")]
    RenderAssetMissing(String),

    /// Compositing failed for reasons other than missing inputs.
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// A poster-store write collided with existing state.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    /// Another job is already processing the item.
    #[error("item busy: {0}")]
    Busy(String),

    /// A per-item or per-call deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The surrounding job was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Revert preconditions (original poster + processed tag) not met.
    #[error("cannot revert: {0}")]
    CannotRevert(String),

    /// An attribute symbol has no badge mapping.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("io error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to its stable [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Error::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Error::CatalogUnreachable(_) => ErrorKind::CatalogUnreachable,
            Error::CatalogUnauthorized(_) => ErrorKind::CatalogUnauthorized,
            Error::CatalogNotFound(_) => ErrorKind::CatalogNotFound,
            Error::CatalogRateLimited { .. } => ErrorKind::CatalogRateLimited,
            Error::CatalogInvalidResponse(_) => ErrorKind::CatalogInvalidResponse,
            Error::ImageFetchFailed(_) => ErrorKind::ImageFetchFailed,
            Error::ImageInvalid(_) => ErrorKind::ImageInvalid,
            Error::ImageTooLarge(_) => ErrorKind::ImageTooLarge,
            Error::SourceUnreachable { .. } => ErrorKind::SourceUnreachable,
            Error::SourceRateLimited { .. } => ErrorKind::SourceRateLimited,
            Error::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            Error::SourceInvalidResponse { .. } => ErrorKind::SourceInvalidResponse,
            Error::RenderFontMissing(_) => ErrorKind::RenderFontMissing,
            Error::RenderAssetMissing(_) => ErrorKind::RenderAssetMissing,
            Error::RenderFailed(_) => ErrorKind::RenderFailed,
            Error::StorageConflict(_) => ErrorKind::StorageConflict,
            Error::Busy(_) => ErrorKind::Busy,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::CannotRevert(_) => ErrorKind::CannotRevert,
            Error::UnknownSymbol(_) => ErrorKind::UnknownSymbol,
            Error::Database(_) | Error::Io { .. } => ErrorKind::StorageIo,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Server-provided back-off hint, if this error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::CatalogRateLimited { retry_after }
            | Error::SourceRateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(message: impl fmt::Display) -> Self {
        Error::Database(message.to_string())
    }

    /// Convenience constructor for [`Error::SourceUnreachable`].
    pub fn source_unreachable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SourceUnreachable {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::SourceInvalidResponse`].
    pub fn source_invalid(source: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SourceInvalidResponse {
            source_name: source.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
