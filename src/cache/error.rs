//! Error types for the cache tiers and the fetch coordinator

use std::path::PathBuf;

use thiserror::Error;

use super::codec::CodecError;
use super::key::KeyError;

/// Failures inside a cache tier
///
/// These never reach callers of `resolve`: the facade logs them and treats
/// the tier as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Persistent storage could not be read or written
    #[error("Disk cache I/O failed at {path}: {source}")]
    DiskIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No cache directory was configured and none could be derived
    #[error("No cache directory available")]
    NoCacheDir,

    /// A record could not be converted to bytes
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl CacheError {
    pub(crate) fn disk_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::DiskIo {
            path: path.into(),
            source,
        }
    }
}

/// A network fetch of detail bytes failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The fetcher has no way to fetch this key
    #[error("Fetch not supported: {0}")]
    Unsupported(String),
}

/// What a caller of `resolve` can see
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The key was rejected before any tier was consulted
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// The network fetch failed; the next resolve retries it
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Freshly fetched bytes did not decode into a record
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// The shared fetch task ended without producing a result
    #[error("Fetch for '{0}' was aborted")]
    Aborted(String),
}

impl ResolveError {
    /// Returns true when retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Fetch(_) | ResolveError::Aborted(_))
    }
}
