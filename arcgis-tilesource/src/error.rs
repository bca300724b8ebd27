//! Error types surfaced by the tile source.
//!
//! Every failure a caller can see from [`crate::TileSource`] is a
//! [`TileSourceError`]. The coarser [`ErrorKind`] groups them so that the
//! host toolkit can decide what to cache and what to retry without matching
//! on every variant.

use std::fmt;

use thiserror::Error;

use crate::http::HttpError;
use crate::map_service::MapServiceError;

/// Result type for tile source operations.
pub type TileSourceResult<T> = Result<T, TileSourceError>;

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed `url`, or a malformed profile override.
    Configuration,
    /// The `?f=json` descriptor could not be fetched or parsed.
    MetadataUnavailable,
    /// The descriptor parsed but is missing fields or contradicts itself.
    MetadataInconsistent,
    /// Transport failure while fetching a tile.
    TileNetwork,
    /// The service has no tile at this key. A normal outcome.
    TileNotFound,
    /// Bytes arrived but could not be decoded into an image.
    TileDecode,
    /// The caller cancelled the request.
    Cancelled,
    /// The operation is not supported by this source.
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::MetadataUnavailable => "metadata-unavailable",
            ErrorKind::MetadataInconsistent => "metadata-inconsistent",
            ErrorKind::TileNetwork => "tile-network",
            ErrorKind::TileNotFound => "tile-not-found",
            ErrorKind::TileDecode => "tile-decode",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::NotImplemented => "not-implemented",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`crate::TileSource`] operations.
#[derive(Debug, Clone, Error)]
pub enum TileSourceError {
    /// Source options are missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Service metadata initialization failed; the source is degraded.
    #[error("Map service unavailable: {0}")]
    Metadata(#[from] MapServiceError),

    /// `create_image` was called before `initialize`.
    #[error("Tile source has not been initialized")]
    NotInitialized,

    /// Transport failure while fetching a tile.
    #[error("Tile request failed: {0}")]
    Network(HttpError),

    /// The service has no tile for this key.
    #[error("No tile at {url}")]
    NotFound { url: String },

    /// The response could not be decoded.
    #[error("Failed to decode tile from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The request was cancelled through its progress handle.
    #[error("Request cancelled")]
    Cancelled,

    /// The operation is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl TileSourceError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileSourceError::Configuration(_) => ErrorKind::Configuration,
            TileSourceError::Metadata(e) if e.is_unavailable() => ErrorKind::MetadataUnavailable,
            TileSourceError::Metadata(_) => ErrorKind::MetadataInconsistent,
            TileSourceError::NotInitialized => ErrorKind::Configuration,
            TileSourceError::Network(_) => ErrorKind::TileNetwork,
            TileSourceError::NotFound { .. } => ErrorKind::TileNotFound,
            TileSourceError::Decode { .. } => ErrorKind::TileDecode,
            TileSourceError::Cancelled => ErrorKind::Cancelled,
            TileSourceError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }

    /// Returns true if a negative result may be cached for this key.
    ///
    /// Only a missing tile qualifies; transient network failures and
    /// cancellations must not mask a later successful fetch.
    pub fn is_cacheable_miss(&self) -> bool {
        self.kind() == ErrorKind::TileNotFound
    }
}

impl From<HttpError> for TileSourceError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Cancelled => TileSourceError::Cancelled,
            HttpError::Status { status: 404, url } => TileSourceError::NotFound { url },
            other => TileSourceError::Network(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_404_maps_to_not_found() {
        let err: TileSourceError = HttpError::Status {
            status: 404,
            url: "http://host/tile/0/0/0.png".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::TileNotFound);
        assert!(err.is_cacheable_miss());
    }

    #[test]
    fn test_http_500_maps_to_network() {
        let err: TileSourceError = HttpError::Status {
            status: 500,
            url: "http://host/tile/0/0/0.png".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::TileNetwork);
        assert!(!err.is_cacheable_miss());
    }

    #[test]
    fn test_http_cancelled_maps_to_cancelled() {
        let err: TileSourceError = HttpError::Cancelled.into();
        assert!(matches!(err, TileSourceError::Cancelled));
        assert!(!err.is_cacheable_miss());
    }

    #[test]
    fn test_metadata_kinds() {
        let unavailable = TileSourceError::Metadata(MapServiceError::Parse("eof".to_string()));
        assert_eq!(unavailable.kind(), ErrorKind::MetadataUnavailable);

        let inconsistent =
            TileSourceError::Metadata(MapServiceError::NonSquareTiles { rows: 256, cols: 512 });
        assert_eq!(inconsistent.kind(), ErrorKind::MetadataInconsistent);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::TileNotFound.to_string(), "tile-not-found");
        assert_eq!(
            ErrorKind::MetadataInconsistent.to_string(),
            "metadata-inconsistent"
        );
    }

    #[test]
    fn test_error_display() {
        let err = TileSourceError::Decode {
            url: "http://host/x".to_string(),
            reason: "bad magic".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to decode tile from http://host/x: bad magic"
        );
    }
}
