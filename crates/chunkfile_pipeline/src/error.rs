//! Error types for pipeline operations.

use std::io;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while running a transform pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An external transform tool failed.
    ///
    /// Covers a missing executable, a non-zero exit, fatal diagnostic
    /// output on a strict stage, and an exceeded stage deadline.
    #[error("external tool `{tool}` failed: {message}")]
    ExternalTool {
        /// Name of the failing stage or tool.
        tool: String,
        /// Description of the failure.
        message: String,
    },
}

impl PipelineError {
    /// Creates an external tool failure.
    pub fn external_tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
