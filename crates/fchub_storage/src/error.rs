//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The batch log is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A batch could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The store is closed.
    #[error("storage is closed")]
    Closed,
}
