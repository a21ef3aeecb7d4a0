//! Error types for chunk operations.

use std::io;
use thiserror::Error;

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors that can occur while working with chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Stream error from the underlying byte store.
    #[error("stream error: {0}")]
    Stream(#[from] chunkfile_stream::StreamError),

    /// Transform pipeline error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] chunkfile_pipeline::PipelineError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation illegal for the chunk's current open mode or state.
    #[error("invalid mode: {message}")]
    InvalidMode {
        /// Description of the violation.
        message: String,
    },

    /// A record failed to decode mid-stream.
    ///
    /// Distinct from a clean end-of-stream: this covers corrupt bytes and
    /// a record truncated before its final byte.
    #[error("malformed record: {message}")]
    MalformedRecord {
        /// Description of the decode failure.
        message: String,
    },

    /// A message could not be encoded.
    #[error("message encoding failed: {message}")]
    EncodeFailed {
        /// Description of the encode failure.
        message: String,
    },

    /// Illegal combination of source, mode, and existence at construction.
    #[error("invalid source: {message}")]
    InvalidSource {
        /// Description of the precondition violation.
        message: String,
    },

    /// A digest was requested with neither an input nor an output stream
    /// attached.
    #[error("no stream attached: digest unavailable")]
    NoStreamAttached,
}

impl ChunkError {
    /// Creates an invalid mode error.
    pub fn invalid_mode(message: impl Into<String>) -> Self {
        Self::InvalidMode {
            message: message.into(),
        }
    }

    /// Creates a malformed record error.
    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    /// Creates an encode failure error.
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid source error.
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource {
            message: message.into(),
        }
    }
}
