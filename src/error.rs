//! Error types for the report engine.
//!
//! Running out of records is not an error: [`crate::datasource::Exhausted`]
//! is returned by the cursor and consumed by the pagination loop.

use std::io;
use thiserror::Error;

use crate::record::AttributeError;

/// Result type alias for franq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort validation, loading, or a render pass.
#[derive(Error, Debug)]
pub enum Error {
    /// The document is malformed (bad column count, missing attribute,
    /// invalid border spec, unknown callback name...). Raised before any
    /// draw call is issued.
    #[error("Invalid report configuration: {0}")]
    Config(String),

    /// A `Field` attribute path could not be resolved against a record.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// A formatter rejected the value it was given.
    #[error("Formatter failed for {element}: {message}")]
    Format { element: String, message: String },

    /// A subdetail band names a collection the current record does not carry.
    #[error("Subdetail band '{band}' expects attribute '{path}' on record #{record_index}")]
    MissingSubdetail {
        band: String,
        record_index: usize,
        path: String,
    },

    /// The paint backend failed. Output already emitted is not rolled back.
    #[error("Paint backend error: {0}")]
    Backend(String),

    /// The render was cancelled between two records.
    #[error("Render cancelled on page {page} after {records} records")]
    Cancelled { page: usize, records: usize },

    /// JSON input failed to parse.
    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An image could not be decoded or embedded.
    #[error("Image error: {0}")]
    Image(String),

    /// A font could not be parsed.
    #[error("Font error: {0}")]
    Font(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Data errors may be replaced by a placeholder; everything else aborts.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Error::Attribute(_) | Error::Format { .. })
    }
}
