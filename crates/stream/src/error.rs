//! Error types for producer ingestion.
//!
//! [`RecordError`] is always local to one record and never ends a
//! connection. [`StreamError`] covers listener-level failures.

use telemetry_core::ReadingError;
use thiserror::Error;

/// Reasons a single wire record is discarded.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Bytes are not UTF-8
    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Not JSON, missing a required field, or a field has the wrong type
    #[error("record is not a valid reading: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON carrying an unusable value
    #[error("record failed validation: {0}")]
    Invalid(#[from] ReadingError),

    /// No delimiter within the configured record limit
    #[error("record exceeds {limit} bytes without a delimiter")]
    Oversized {
        /// Configured limit
        limit: usize,
    },
}

/// Errors that can occur in ingest listener operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid adapter configuration
    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
