//! Error types for the mirror.

use thiserror::Error;

/// Errors that can occur while mirroring.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed after retries, or was rejected outright.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Index parsing failed (Release-level failures abort the timestamp).
    #[error("Index parse error: {0}")]
    Parse(#[from] apt_index::IndexError),

    /// Provenance store operation failed.
    #[error(transparent)]
    Store(#[from] debsnap_store::StoreError),

    /// Another process holds the archive write lock.
    #[error("Archive '{0}' is locked by another process")]
    LockHeld(String),

    /// Upstream answered with something unusable.
    #[error("Unusable upstream response: {0}")]
    Upstream(String),

    /// Bad command line or environment.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors of a single fetch, split by retry class.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Retryable failure that survived the whole backoff schedule.
    #[error("Gave up on {url}: {reason}")]
    Transient {
        /// The requested URL.
        url: String,
        /// Last observed failure.
        reason: String,
    },

    /// The URL does not exist upstream (404/410).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access denied (401/403).
    #[error("Access denied ({status}): {url}")]
    Denied {
        /// The requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The full body hashed to something else than advertised.
    #[error("SHA256 mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        /// The requested URL.
        url: String,
        /// Advertised hash.
        expected: String,
        /// Computed hash.
        actual: String,
    },

    /// The body length disagreed with the advertised size.
    #[error("Size mismatch for {url}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// The requested URL.
        url: String,
        /// Advertised size.
        expected: u64,
        /// Received size.
        actual: u64,
    },

    /// Local write failed while streaming the body.
    #[error("I/O error while fetching {url}: {source}")]
    Io {
        /// The requested URL.
        url: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether the failure is specific to one file rather than the run.
    /// Per-file failures are collected and summarized; they do not abort
    /// the tuple.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound(_)
                | FetchError::HashMismatch { .. }
                | FetchError::SizeMismatch { .. }
        )
    }
}
