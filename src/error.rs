//! Error types for filedrop.

use thiserror::Error;

/// Common error type for filedrop.
#[derive(Error, Debug)]
pub enum FiledropError {
    /// The upload carried no file field or no content.
    #[error("no file uploaded")]
    MissingFile,

    /// Validation error for user input (bucket keys, file names).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid admin passcode or token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Stored file (or bucket) not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Rename target already exists.
    #[error("name conflict: {0} already exists")]
    NameConflict(String),

    /// A bucket directory could not be created.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Writing an upload to disk failed.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    /// No free name could be found for an upload.
    #[error("could not allocate a unique name after {0} attempts")]
    AllocationExhausted(usize),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for filedrop operations.
pub type Result<T> = std::result::Result<T, FiledropError>;
