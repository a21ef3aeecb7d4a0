//! Error types for stream operations.

use std::io;
use thiserror::Error;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur during stream operations.
///
/// Streams surface only the failures of their underlying store; the digest
/// wrappers add no error kind of their own.
#[derive(Debug, Error)]
pub enum StreamError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
