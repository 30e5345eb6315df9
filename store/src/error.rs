//! Error types for the provenance store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A sha256 was re-observed with a different size; the store refuses
    /// to overwrite and the surrounding tuple must abort.
    #[error("Size drift for {sha256}: stored {stored}, observed {observed}")]
    SizeDrift {
        /// The affected file hash.
        sha256: String,
        /// Size currently recorded.
        stored: u64,
        /// Size carried by the new observation.
        observed: u64,
    },

    /// A timestamp value outside the canonical `YYYYMMDDThhmmssZ` form.
    #[error("Invalid timestamp value: {0}")]
    InvalidTimestamp(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
