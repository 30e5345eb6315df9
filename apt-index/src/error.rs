//! Error types for the APT index library.

/// Result type for index parsing operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur when parsing APT index files.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// I/O error while reading the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line that is neither a field, a continuation nor a separator.
    #[error("Malformed control line: {0}")]
    MalformedLine(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value.
    #[error("Invalid field value for '{field}': {value}")]
    InvalidField { field: String, value: String },

    /// Unsupported compression extension.
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),
}

impl IndexError {
    /// Create a new missing field error.
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a new invalid field error.
    pub fn invalid_field<S: Into<String>>(field: S, value: S) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}
